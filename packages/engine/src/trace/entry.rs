// packages/engine/src/trace/entry.rs
//! Trace entries
//!
//! An [`Entry`] is one trace record. Each kind carries its own typed fields,
//! so the consumer never reinterprets untyped words. Strings are owned: the
//! producer gives them up on insert and the consumer drops them after the
//! backend handler ran.
//!
//! Producers that speak the numeric record form (kind code, subject id, four
//! slots) go through [`RawEntry`] and [`Entry::from_raw`], which checks the
//! kind code and every slot before building a typed entry.

use crate::trace::sampling::{Sampling, SpanCategory};
use once_cell::sync::Lazy;
use std::time::Instant;

/// Opaque identifier of a simulation object (module, process, port, ...)
pub type SubjectId = u64;

/// Monotonic wall-clock nanoseconds since the engine's epoch
pub type RealTime = u64;

/// Simulated time in ticks (picoseconds)
pub type SimTime = u64;

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Origin of [`real_time_stamp`], fixed on first use
pub fn real_time_epoch() -> Instant {
    *Lazy::force(&EPOCH)
}

/// Nanoseconds elapsed since [`real_time_epoch`]
pub fn real_time_stamp() -> RealTime {
    EPOCH.elapsed().as_nanos() as RealTime
}

/// Simulation process flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcKind {
    Method,
    Thread,
    CThread,
}

impl ProcKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcKind::Method => "METHOD",
            ProcKind::Thread => "THREAD",
            ProcKind::CThread => "CTHREAD",
        }
    }

    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(ProcKind::Method),
            1 => Some(ProcKind::Thread),
            2 => Some(ProcKind::CThread),
            _ => None,
        }
    }
}

/// Elaboration phase a module goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModulePhase {
    Construction,
    BeforeEndOfElaboration,
    EndOfElaboration,
    StartOfSimulation,
}

impl ModulePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModulePhase::Construction => "CONSTRUCTION",
            ModulePhase::BeforeEndOfElaboration => "BEFORE_END_OF_ELABORATION",
            ModulePhase::EndOfElaboration => "END_OF_ELABORATION",
            ModulePhase::StartOfSimulation => "START_OF_SIMULATION",
        }
    }

    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(ModulePhase::Construction),
            1 => Some(ModulePhase::BeforeEndOfElaboration),
            2 => Some(ModulePhase::EndOfElaboration),
            3 => Some(ModulePhase::StartOfSimulation),
            _ => None,
        }
    }
}

/// How two ports were bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Normal,
    Hierarchy,
}

impl BindingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingKind::Normal => "NORMAL",
            BindingKind::Hierarchy => "HIERARCHY",
        }
    }

    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(BindingKind::Normal),
            1 => Some(BindingKind::Hierarchy),
            _ => None,
        }
    }
}

/// Protocol spoken over a binding or carried by a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    Unknown,
    Signal,
    Tlm,
    Gpio,
    Clk,
    Pci,
    I2c,
    Spi,
    Sd,
    Serial,
    Virtio,
    Ethernet,
    Can,
    Usb,
}

/// Payload type-name fragments, checked in order
const PROTOCOL_PATTERNS: &[(&str, ProtocolKind)] = &[
    ("sc_signal", ProtocolKind::Signal),
    ("tlm", ProtocolKind::Tlm),
    ("gpio_payload", ProtocolKind::Gpio),
    ("clk_payload", ProtocolKind::Clk),
    ("pci_payload", ProtocolKind::Pci),
    ("i2c_payload", ProtocolKind::I2c),
    ("spi_payload", ProtocolKind::Spi),
    ("sd_protocol_types", ProtocolKind::Sd),
    ("serial_payload", ProtocolKind::Serial),
    ("vq_message", ProtocolKind::Virtio),
    ("eth_frame", ProtocolKind::Ethernet),
    ("can_frame", ProtocolKind::Can),
    ("usb_packet", ProtocolKind::Usb),
];

impl ProtocolKind {
    pub const ALL: [ProtocolKind; 14] = [
        ProtocolKind::Unknown,
        ProtocolKind::Signal,
        ProtocolKind::Tlm,
        ProtocolKind::Gpio,
        ProtocolKind::Clk,
        ProtocolKind::Pci,
        ProtocolKind::I2c,
        ProtocolKind::Spi,
        ProtocolKind::Sd,
        ProtocolKind::Serial,
        ProtocolKind::Virtio,
        ProtocolKind::Ethernet,
        ProtocolKind::Can,
        ProtocolKind::Usb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolKind::Unknown => "UNKNOWN",
            ProtocolKind::Signal => "SIGNAL",
            ProtocolKind::Tlm => "TLM",
            ProtocolKind::Gpio => "GPIO",
            ProtocolKind::Clk => "CLK",
            ProtocolKind::Pci => "PCI",
            ProtocolKind::I2c => "I2C",
            ProtocolKind::Spi => "SPI",
            ProtocolKind::Sd => "SD",
            ProtocolKind::Serial => "SERIAL",
            ProtocolKind::Virtio => "VIRTIO",
            ProtocolKind::Ethernet => "ETHERNET",
            ProtocolKind::Can => "CAN",
            ProtocolKind::Usb => "USB",
        }
    }

    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn from_code(code: u64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
    }

    /// Classify a port by the type name of the payload it carries
    pub fn from_type_name(type_name: &str) -> Self {
        PROTOCOL_PATTERNS
            .iter()
            .find(|(pattern, _)| type_name.contains(pattern))
            .map(|(_, kind)| *kind)
            .unwrap_or(ProtocolKind::Unknown)
    }
}

/// Kind tag of an entry; the discriminant is the numeric wire code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    ModuleCreated = 0,
    ProcessCreated,
    PortCreated,
    EventCreated,
    ChannelCreated,
    PortBound,
    ModulePhaseStarted,
    ModulePhaseFinished,
    ProcessStart,
    ProcessYield,
    EventNotifyImmediate,
    EventNotifyDelta,
    EventNotifyTimed,
    EventCancel,
    ChannelUpdateStart,
    ChannelUpdateComplete,
    CpuIdleEnter,
    CpuIdleLeave,
    CpuCallStack,
    TransactionTraceFw,
    TransactionTraceBw,
    LogMessage,
}

impl EntryKind {
    pub const ALL: [EntryKind; 22] = [
        EntryKind::ModuleCreated,
        EntryKind::ProcessCreated,
        EntryKind::PortCreated,
        EntryKind::EventCreated,
        EntryKind::ChannelCreated,
        EntryKind::PortBound,
        EntryKind::ModulePhaseStarted,
        EntryKind::ModulePhaseFinished,
        EntryKind::ProcessStart,
        EntryKind::ProcessYield,
        EntryKind::EventNotifyImmediate,
        EntryKind::EventNotifyDelta,
        EntryKind::EventNotifyTimed,
        EntryKind::EventCancel,
        EntryKind::ChannelUpdateStart,
        EntryKind::ChannelUpdateComplete,
        EntryKind::CpuIdleEnter,
        EntryKind::CpuIdleLeave,
        EntryKind::CpuCallStack,
        EntryKind::TransactionTraceFw,
        EntryKind::TransactionTraceBw,
        EntryKind::LogMessage,
    ];

    pub fn code(&self) -> u32 {
        *self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// How the runtime sampling gate treats this kind
    pub fn sampling(&self) -> Sampling {
        match self {
            EntryKind::ProcessStart => Sampling::Start(SpanCategory::Scheduling),
            EntryKind::ProcessYield => Sampling::End(SpanCategory::Scheduling),
            EntryKind::ChannelUpdateStart => Sampling::Start(SpanCategory::ChannelUpdate),
            EntryKind::ChannelUpdateComplete => Sampling::End(SpanCategory::ChannelUpdate),
            EntryKind::CpuIdleEnter => Sampling::Start(SpanCategory::CpuIdle),
            EntryKind::CpuIdleLeave => Sampling::End(SpanCategory::CpuIdle),
            EntryKind::EventNotifyImmediate
            | EntryKind::EventNotifyDelta
            | EntryKind::EventNotifyTimed
            | EntryKind::EventCancel
            | EntryKind::CpuCallStack
            | EntryKind::TransactionTraceFw
            | EntryKind::TransactionTraceBw => Sampling::Window,
            EntryKind::ModuleCreated
            | EntryKind::ProcessCreated
            | EntryKind::PortCreated
            | EntryKind::EventCreated
            | EntryKind::ChannelCreated
            | EntryKind::PortBound
            | EntryKind::ModulePhaseStarted
            | EntryKind::ModulePhaseFinished
            | EntryKind::LogMessage => Sampling::Always,
        }
    }
}

/// One trace event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    ModuleCreated {
        id: SubjectId,
        name: String,
        kind: String,
    },
    ProcessCreated {
        id: SubjectId,
        name: String,
        kind: ProcKind,
    },
    PortCreated {
        id: SubjectId,
        name: String,
    },
    EventCreated {
        id: SubjectId,
        name: String,
    },
    ChannelCreated {
        id: SubjectId,
        name: String,
        kind: String,
    },
    PortBound {
        from: SubjectId,
        to: SubjectId,
        binding: BindingKind,
        protocol: ProtocolKind,
    },
    ModulePhaseStarted {
        id: SubjectId,
        phase: ModulePhase,
        real_time: RealTime,
    },
    ModulePhaseFinished {
        id: SubjectId,
        phase: ModulePhase,
        real_time: RealTime,
    },
    ProcessStart {
        id: SubjectId,
        real_time: RealTime,
        sim_time: SimTime,
    },
    ProcessYield {
        id: SubjectId,
        real_time: RealTime,
        sim_time: SimTime,
    },
    EventNotifyImmediate {
        id: SubjectId,
        real_time: RealTime,
        sim_time: SimTime,
    },
    EventNotifyDelta {
        id: SubjectId,
        real_time: RealTime,
        sim_time: SimTime,
    },
    EventNotifyTimed {
        id: SubjectId,
        real_time: RealTime,
        sim_time: SimTime,
        delay: SimTime,
    },
    EventCancel {
        id: SubjectId,
        real_time: RealTime,
        sim_time: SimTime,
    },
    ChannelUpdateStart {
        id: SubjectId,
        real_time: RealTime,
        sim_time: SimTime,
    },
    ChannelUpdateComplete {
        id: SubjectId,
        real_time: RealTime,
        sim_time: SimTime,
    },
    CpuIdleEnter {
        id: SubjectId,
        sim_time: SimTime,
    },
    CpuIdleLeave {
        id: SubjectId,
        sim_time: SimTime,
    },
    CpuCallStack {
        id: SubjectId,
        sim_time: SimTime,
        level: u32,
        address: u64,
        symbol: String,
    },
    TransactionTraceFw {
        id: SubjectId,
        sim_time: SimTime,
        protocol: ProtocolKind,
        payload: String,
    },
    TransactionTraceBw {
        id: SubjectId,
        sim_time: SimTime,
        protocol: ProtocolKind,
        payload: String,
    },
    LogMessage {
        sim_time: SimTime,
        level: i32,
        sender: String,
        message: String,
    },
    /// A record whose kind code or slot layout was not recognised
    Unknown { code: u32, id: SubjectId },
}

impl Entry {
    /// Kind tag, `None` for unrecognised records
    pub fn kind(&self) -> Option<EntryKind> {
        let kind = match self {
            Entry::ModuleCreated { .. } => EntryKind::ModuleCreated,
            Entry::ProcessCreated { .. } => EntryKind::ProcessCreated,
            Entry::PortCreated { .. } => EntryKind::PortCreated,
            Entry::EventCreated { .. } => EntryKind::EventCreated,
            Entry::ChannelCreated { .. } => EntryKind::ChannelCreated,
            Entry::PortBound { .. } => EntryKind::PortBound,
            Entry::ModulePhaseStarted { .. } => EntryKind::ModulePhaseStarted,
            Entry::ModulePhaseFinished { .. } => EntryKind::ModulePhaseFinished,
            Entry::ProcessStart { .. } => EntryKind::ProcessStart,
            Entry::ProcessYield { .. } => EntryKind::ProcessYield,
            Entry::EventNotifyImmediate { .. } => EntryKind::EventNotifyImmediate,
            Entry::EventNotifyDelta { .. } => EntryKind::EventNotifyDelta,
            Entry::EventNotifyTimed { .. } => EntryKind::EventNotifyTimed,
            Entry::EventCancel { .. } => EntryKind::EventCancel,
            Entry::ChannelUpdateStart { .. } => EntryKind::ChannelUpdateStart,
            Entry::ChannelUpdateComplete { .. } => EntryKind::ChannelUpdateComplete,
            Entry::CpuIdleEnter { .. } => EntryKind::CpuIdleEnter,
            Entry::CpuIdleLeave { .. } => EntryKind::CpuIdleLeave,
            Entry::CpuCallStack { .. } => EntryKind::CpuCallStack,
            Entry::TransactionTraceFw { .. } => EntryKind::TransactionTraceFw,
            Entry::TransactionTraceBw { .. } => EntryKind::TransactionTraceBw,
            Entry::LogMessage { .. } => EntryKind::LogMessage,
            Entry::Unknown { .. } => return None,
        };
        Some(kind)
    }

    /// Object the entry refers to (`0` for log messages)
    pub fn subject_id(&self) -> SubjectId {
        match self {
            Entry::ModuleCreated { id, .. }
            | Entry::ProcessCreated { id, .. }
            | Entry::PortCreated { id, .. }
            | Entry::EventCreated { id, .. }
            | Entry::ChannelCreated { id, .. }
            | Entry::ModulePhaseStarted { id, .. }
            | Entry::ModulePhaseFinished { id, .. }
            | Entry::ProcessStart { id, .. }
            | Entry::ProcessYield { id, .. }
            | Entry::EventNotifyImmediate { id, .. }
            | Entry::EventNotifyDelta { id, .. }
            | Entry::EventNotifyTimed { id, .. }
            | Entry::EventCancel { id, .. }
            | Entry::ChannelUpdateStart { id, .. }
            | Entry::ChannelUpdateComplete { id, .. }
            | Entry::CpuIdleEnter { id, .. }
            | Entry::CpuIdleLeave { id, .. }
            | Entry::CpuCallStack { id, .. }
            | Entry::TransactionTraceFw { id, .. }
            | Entry::TransactionTraceBw { id, .. }
            | Entry::Unknown { id, .. } => *id,
            Entry::PortBound { from, .. } => *from,
            Entry::LogMessage { .. } => 0,
        }
    }

    /// Decode a numeric record.
    ///
    /// Never fails: anything that does not match a known layout becomes
    /// [`Entry::Unknown`], and whatever strings the record owned are dropped
    /// here.
    pub fn from_raw(raw: RawEntry) -> Entry {
        let RawEntry {
            code,
            subject_id,
            slots,
        } = raw;

        EntryKind::from_code(code)
            .and_then(|kind| Self::decode(kind, subject_id, slots))
            .unwrap_or(Entry::Unknown {
                code,
                id: subject_id,
            })
    }

    fn decode(kind: EntryKind, id: SubjectId, slots: [Slot; 4]) -> Option<Entry> {
        let [a, b, c, d] = slots;

        let entry = match kind {
            EntryKind::ModuleCreated => Entry::ModuleCreated {
                id,
                name: a.into_text()?,
                kind: b.into_text()?,
            },
            EntryKind::ProcessCreated => Entry::ProcessCreated {
                id,
                name: a.into_text()?,
                kind: ProcKind::from_code(b.word()?)?,
            },
            EntryKind::PortCreated => Entry::PortCreated {
                id,
                name: a.into_text()?,
            },
            EntryKind::EventCreated => Entry::EventCreated {
                id,
                name: a.into_text()?,
            },
            EntryKind::ChannelCreated => Entry::ChannelCreated {
                id,
                name: a.into_text()?,
                kind: b.into_text()?,
            },
            EntryKind::PortBound => Entry::PortBound {
                from: id,
                to: a.word()?,
                binding: BindingKind::from_code(b.word()?)?,
                protocol: ProtocolKind::from_code(c.word()?)?,
            },
            EntryKind::ModulePhaseStarted => Entry::ModulePhaseStarted {
                id,
                phase: ModulePhase::from_code(a.word()?)?,
                real_time: b.word()?,
            },
            EntryKind::ModulePhaseFinished => Entry::ModulePhaseFinished {
                id,
                phase: ModulePhase::from_code(a.word()?)?,
                real_time: b.word()?,
            },
            EntryKind::ProcessStart => Entry::ProcessStart {
                id,
                real_time: a.word()?,
                sim_time: b.word()?,
            },
            EntryKind::ProcessYield => Entry::ProcessYield {
                id,
                real_time: a.word()?,
                sim_time: b.word()?,
            },
            EntryKind::EventNotifyImmediate => Entry::EventNotifyImmediate {
                id,
                real_time: a.word()?,
                sim_time: b.word()?,
            },
            EntryKind::EventNotifyDelta => Entry::EventNotifyDelta {
                id,
                real_time: a.word()?,
                sim_time: b.word()?,
            },
            EntryKind::EventNotifyTimed => Entry::EventNotifyTimed {
                id,
                real_time: a.word()?,
                sim_time: b.word()?,
                delay: c.word()?,
            },
            EntryKind::EventCancel => Entry::EventCancel {
                id,
                real_time: a.word()?,
                sim_time: b.word()?,
            },
            EntryKind::ChannelUpdateStart => Entry::ChannelUpdateStart {
                id,
                real_time: a.word()?,
                sim_time: b.word()?,
            },
            EntryKind::ChannelUpdateComplete => Entry::ChannelUpdateComplete {
                id,
                real_time: a.word()?,
                sim_time: b.word()?,
            },
            EntryKind::CpuIdleEnter => Entry::CpuIdleEnter {
                id,
                sim_time: a.word()?,
            },
            EntryKind::CpuIdleLeave => Entry::CpuIdleLeave {
                id,
                sim_time: a.word()?,
            },
            EntryKind::CpuCallStack => Entry::CpuCallStack {
                id,
                sim_time: a.word()?,
                level: u32::try_from(b.word()?).ok()?,
                address: c.word()?,
                symbol: d.into_text()?,
            },
            EntryKind::TransactionTraceFw => Entry::TransactionTraceFw {
                id,
                sim_time: a.word()?,
                protocol: ProtocolKind::from_code(b.word()?)?,
                payload: c.into_text()?,
            },
            EntryKind::TransactionTraceBw => Entry::TransactionTraceBw {
                id,
                sim_time: a.word()?,
                protocol: ProtocolKind::from_code(b.word()?)?,
                payload: c.into_text()?,
            },
            EntryKind::LogMessage => Entry::LogMessage {
                sim_time: a.word()?,
                // levels travel sign-extended
                level: i32::try_from(b.word()? as i64).ok()?,
                sender: c.into_text()?,
                message: d.into_text()?,
            },
        };

        Some(entry)
    }

    /// Encode into the numeric record form
    pub fn into_raw(self) -> RawEntry {
        use Slot::{Empty, Text, Word};

        let (kind, id, slots) = match self {
            Entry::ModuleCreated { id, name, kind } => {
                (EntryKind::ModuleCreated, id, [Text(name), Text(kind), Empty, Empty])
            }
            Entry::ProcessCreated { id, name, kind } => (
                EntryKind::ProcessCreated,
                id,
                [Text(name), Word(kind.code() as u64), Empty, Empty],
            ),
            Entry::PortCreated { id, name } => {
                (EntryKind::PortCreated, id, [Text(name), Empty, Empty, Empty])
            }
            Entry::EventCreated { id, name } => {
                (EntryKind::EventCreated, id, [Text(name), Empty, Empty, Empty])
            }
            Entry::ChannelCreated { id, name, kind } => {
                (EntryKind::ChannelCreated, id, [Text(name), Text(kind), Empty, Empty])
            }
            Entry::PortBound {
                from,
                to,
                binding,
                protocol,
            } => (
                EntryKind::PortBound,
                from,
                [
                    Word(to),
                    Word(binding.code() as u64),
                    Word(protocol.code() as u64),
                    Empty,
                ],
            ),
            Entry::ModulePhaseStarted {
                id,
                phase,
                real_time,
            } => (
                EntryKind::ModulePhaseStarted,
                id,
                [Word(phase.code() as u64), Word(real_time), Empty, Empty],
            ),
            Entry::ModulePhaseFinished {
                id,
                phase,
                real_time,
            } => (
                EntryKind::ModulePhaseFinished,
                id,
                [Word(phase.code() as u64), Word(real_time), Empty, Empty],
            ),
            Entry::ProcessStart { id, real_time, sim_time } => {
                (EntryKind::ProcessStart, id, timed_slots(real_time, sim_time))
            }
            Entry::ProcessYield { id, real_time, sim_time } => {
                (EntryKind::ProcessYield, id, timed_slots(real_time, sim_time))
            }
            Entry::EventNotifyImmediate { id, real_time, sim_time } => {
                (EntryKind::EventNotifyImmediate, id, timed_slots(real_time, sim_time))
            }
            Entry::EventNotifyDelta { id, real_time, sim_time } => {
                (EntryKind::EventNotifyDelta, id, timed_slots(real_time, sim_time))
            }
            Entry::EventNotifyTimed {
                id,
                real_time,
                sim_time,
                delay,
            } => (
                EntryKind::EventNotifyTimed,
                id,
                [Word(real_time), Word(sim_time), Word(delay), Empty],
            ),
            Entry::EventCancel { id, real_time, sim_time } => {
                (EntryKind::EventCancel, id, timed_slots(real_time, sim_time))
            }
            Entry::ChannelUpdateStart { id, real_time, sim_time } => {
                (EntryKind::ChannelUpdateStart, id, timed_slots(real_time, sim_time))
            }
            Entry::ChannelUpdateComplete { id, real_time, sim_time } => {
                (EntryKind::ChannelUpdateComplete, id, timed_slots(real_time, sim_time))
            }
            Entry::CpuIdleEnter { id, sim_time } => {
                (EntryKind::CpuIdleEnter, id, [Word(sim_time), Empty, Empty, Empty])
            }
            Entry::CpuIdleLeave { id, sim_time } => {
                (EntryKind::CpuIdleLeave, id, [Word(sim_time), Empty, Empty, Empty])
            }
            Entry::CpuCallStack {
                id,
                sim_time,
                level,
                address,
                symbol,
            } => (
                EntryKind::CpuCallStack,
                id,
                [Word(sim_time), Word(level as u64), Word(address), Text(symbol)],
            ),
            Entry::TransactionTraceFw {
                id,
                sim_time,
                protocol,
                payload,
            } => (
                EntryKind::TransactionTraceFw,
                id,
                [Word(sim_time), Word(protocol.code() as u64), Text(payload), Empty],
            ),
            Entry::TransactionTraceBw {
                id,
                sim_time,
                protocol,
                payload,
            } => (
                EntryKind::TransactionTraceBw,
                id,
                [Word(sim_time), Word(protocol.code() as u64), Text(payload), Empty],
            ),
            Entry::LogMessage {
                sim_time,
                level,
                sender,
                message,
            } => (
                EntryKind::LogMessage,
                0,
                [Word(sim_time), Word(level as i64 as u64), Text(sender), Text(message)],
            ),
            Entry::Unknown { code, id } => {
                return RawEntry {
                    code,
                    subject_id: id,
                    slots: [Empty, Empty, Empty, Empty],
                }
            }
        };

        RawEntry {
            code: kind.code(),
            subject_id: id,
            slots,
        }
    }
}

fn timed_slots(real_time: RealTime, sim_time: SimTime) -> [Slot; 4] {
    [Slot::Word(real_time), Slot::Word(sim_time), Slot::Empty, Slot::Empty]
}

/// One argument slot of a numeric record
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Slot {
    #[default]
    Empty,

    /// Integer, enum code or time stamp
    Word(u64),

    /// Owned string handed over by the producer
    Text(String),
}

impl Slot {
    fn word(&self) -> Option<u64> {
        match self {
            Slot::Word(word) => Some(*word),
            _ => None,
        }
    }

    fn into_text(self) -> Option<String> {
        match self {
            Slot::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Numeric record: kind code, subject id and four argument slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub code: u32,
    pub subject_id: SubjectId,
    pub slots: [Slot; 4],
}

impl RawEntry {
    pub fn new(code: u32, subject_id: SubjectId) -> Self {
        Self {
            code,
            subject_id,
            slots: Default::default(),
        }
    }

    pub fn with_slot(mut self, idx: usize, slot: Slot) -> Self {
        if let Some(target) = self.slots.get_mut(idx) {
            *target = slot;
        }
        self
    }
}
