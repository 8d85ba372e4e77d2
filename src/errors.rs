//! Maps OS-level failures to the fixed diagnostic lines the shell prints.

use std::io;

/// Diagnostic for a failed open of a redirection endpoint.
#[cfg(unix)]
pub fn open_message(err: &io::Error) -> &'static str {
    match err.raw_os_error() {
        Some(libc::EACCES) => "Access denied",
        Some(libc::EISDIR) => "File is a directory",
        Some(libc::ENOENT) => "No such file",
        _ => "Could not open file",
    }
}

#[cfg(not(unix))]
pub fn open_message(err: &io::Error) -> &'static str {
    match err.kind() {
        io::ErrorKind::PermissionDenied => "Access denied",
        io::ErrorKind::NotFound => "No such file",
        _ => "Could not open file",
    }
}

/// Diagnostic for a failed working-directory change.
///
/// The fallback includes the raw error code so an unclassified failure is
/// still distinguishable.
#[cfg(unix)]
pub fn chdir_message(err: &io::Error) -> String {
    match err.raw_os_error() {
        Some(libc::EACCES) => "Permission denied".to_string(),
        Some(libc::ENOENT) => "No such path".to_string(),
        Some(libc::ENOTDIR) => "Not a directory".to_string(),
        Some(libc::EFAULT) | Some(libc::EINVAL) => "Invalid argument".to_string(),
        Some(code) => format!("Could not change working directory ({code})"),
        None => "Could not change working directory".to_string(),
    }
}

#[cfg(not(unix))]
pub fn chdir_message(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::PermissionDenied => "Permission denied".to_string(),
        io::ErrorKind::NotFound => "No such path".to_string(),
        _ => "Could not change working directory".to_string(),
    }
}

/// Diagnostic for a stage that could not be spawned, distinguishing a
/// missing program from any other exec failure.
pub fn exec_message(err: &io::Error, program: &str) -> String {
    if err.kind() == io::ErrorKind::NotFound {
        format!("Could not find executable: {program}")
    } else {
        format!("Failed to execute: {program}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn open_failures_classified_by_errno() {
        assert_eq!(
            open_message(&io::Error::from_raw_os_error(libc::ENOENT)),
            "No such file"
        );
        assert_eq!(
            open_message(&io::Error::from_raw_os_error(libc::EACCES)),
            "Access denied"
        );
        assert_eq!(
            open_message(&io::Error::from_raw_os_error(libc::EISDIR)),
            "File is a directory"
        );
        assert_eq!(
            open_message(&io::Error::from_raw_os_error(libc::EMFILE)),
            "Could not open file"
        );
    }

    #[cfg(unix)]
    #[test]
    fn chdir_failures_classified_by_errno() {
        assert_eq!(
            chdir_message(&io::Error::from_raw_os_error(libc::ENOENT)),
            "No such path"
        );
        assert_eq!(
            chdir_message(&io::Error::from_raw_os_error(libc::ENOTDIR)),
            "Not a directory"
        );
        assert_eq!(
            chdir_message(&io::Error::from_raw_os_error(libc::EACCES)),
            "Permission denied"
        );
    }

    #[cfg(unix)]
    #[test]
    fn unclassified_chdir_failure_reports_code() {
        let message = chdir_message(&io::Error::from_raw_os_error(libc::ENAMETOOLONG));
        assert!(message.starts_with("Could not change working directory ("));
    }

    #[test]
    fn missing_program_named_in_message() {
        let err = io::Error::new(io::ErrorKind::NotFound, "not found");
        assert_eq!(
            exec_message(&err, "frobnicate"),
            "Could not find executable: frobnicate"
        );
    }

    #[test]
    fn other_exec_failure_named_in_message() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(exec_message(&err, "frobnicate"), "Failed to execute: frobnicate");
    }
}
