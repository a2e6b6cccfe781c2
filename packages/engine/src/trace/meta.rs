// packages/engine/src/trace/meta.rs
//! Process identity recorded once per run

/// Version string recorded when the host does not supply its own
pub fn engine_version() -> String {
    format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Who ran what, when
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaInfo {
    pub pid: u32,
    pub path: String,
    pub user: String,
    pub version: String,

    /// Wall-clock UNIX seconds
    pub timestamp: i64,
}

impl MetaInfo {
    /// Capture the identity of the current process
    pub fn capture(version: Option<&str>) -> Self {
        Self {
            pid: std::process::id(),
            path: program_path(),
            user: user_name(),
            version: version.map(str::to_string).unwrap_or_else(engine_version),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

fn program_path() -> String {
    std::env::current_exe()
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn user_name() -> String {
    resolve_user(login_name(), std::env::var("USER").ok(), passwd_name)
}

/// Login name first, then `$USER`, then the password database
fn resolve_user(
    login: Option<String>,
    env_user: Option<String>,
    passwd: impl FnOnce() -> Option<String>,
) -> String {
    login
        .filter(|u| !u.is_empty())
        .or_else(|| env_user.filter(|u| !u.is_empty()))
        .or_else(passwd)
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(unix)]
extern "C" {
    // POSIX `getlogin_r`; not declared by the `libc` crate
    fn getlogin_r(buf: *mut libc::c_char, bufsize: libc::size_t) -> libc::c_int;
}

#[cfg(unix)]
fn login_name() -> Option<String> {
    let mut buf = [0 as libc::c_char; 256];

    // SAFETY: the buffer outlives the call and its length is passed along;
    // on success it holds a NUL-terminated name
    let rc = unsafe { getlogin_r(buf.as_mut_ptr(), buf.len() - 1) };
    if rc != 0 {
        return None;
    }

    let name = unsafe { std::ffi::CStr::from_ptr(buf.as_ptr()) };
    Some(name.to_string_lossy().into_owned())
}

#[cfg(not(unix))]
fn login_name() -> Option<String> {
    None
}

#[cfg(unix)]
fn passwd_name() -> Option<String> {
    use nix::unistd::{getuid, User};

    User::from_uid(getuid()).ok().flatten().map(|user| user.name)
}

#[cfg(not(unix))]
fn passwd_name() -> Option<String> {
    None
}
