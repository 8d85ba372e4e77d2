//! Opens the pipeline's two external endpoints before any stage is spawned.

use std::fs::{File, OpenOptions};
use std::io;

use crate::errors;

/// Permission bits for a created output target: owner/group read-write,
/// world read. Only applied when the file is created.
#[cfg(unix)]
const OUTPUT_MODE: u32 = 0o664;

/// The resolved external endpoints of one command.
///
/// `None` means "inherit the shell's own standard stream". A `Some` handle
/// is owned here until the spawn loop installs it on a child; dropping an
/// unconsumed handle closes it.
#[derive(Debug)]
pub struct ExternalIo {
    pub input: Option<File>,
    pub output: Option<File>,
}

/// Open the optional redirection endpoints for one command, once, before
/// the stage loop.
///
/// Any failure classifies into a diagnostic and aborts the whole command;
/// an input handle already opened when the output open fails is released
/// by drop on the error path.
pub fn resolve(input: Option<&str>, output: Option<&str>) -> Result<ExternalIo, &'static str> {
    let input = match input {
        Some(path) => Some(File::open(path).map_err(|err| errors::open_message(&err))?),
        None => None,
    };

    let output = match output {
        Some(path) => Some(create_output(path).map_err(|err| errors::open_message(&err))?),
        None => None,
    };

    Ok(ExternalIo { input, output })
}

/// Create-or-truncate the output target for writing. Never appends.
fn create_output(path: &str) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(OUTPUT_MODE);
    }

    options.open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::path::PathBuf;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tsh_redirect_{tag}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn no_redirection_inherits_both_streams() {
        let io = resolve(None, None).unwrap();
        assert!(io.input.is_none());
        assert!(io.output.is_none());
    }

    #[test]
    fn missing_input_file_is_classified() {
        let dir = temp_dir("missing_input");
        let path = dir.join("does_not_exist.txt");
        let err = resolve(Some(path.to_str().unwrap()), None).unwrap_err();
        assert_eq!(err, "No such file");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn input_file_is_opened_for_reading() {
        let dir = temp_dir("input_open");
        let path = dir.join("in.txt");
        std::fs::write(&path, "b\na\n").unwrap();

        let io = resolve(Some(path.to_str().unwrap()), None).unwrap();
        let mut contents = String::new();
        io.input.unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "b\na\n");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn output_target_is_truncated_not_appended() {
        let dir = temp_dir("truncate");
        let path = dir.join("out.txt");
        std::fs::write(&path, "previous contents that are longer").unwrap();

        let io = resolve(None, Some(path.to_str().unwrap())).unwrap();
        drop(io);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn output_path_that_is_a_directory_is_classified() {
        let dir = temp_dir("outdir");
        let err = resolve(None, Some(dir.to_str().unwrap())).unwrap_err();
        assert_eq!(err, "File is a directory");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn output_failure_after_input_open_still_aborts() {
        let dir = temp_dir("both");
        let input = dir.join("in.txt");
        std::fs::write(&input, "data").unwrap();
        let bad_output = dir.join("no_such_subdir").join("out.txt");

        let err = resolve(
            Some(input.to_str().unwrap()),
            Some(bad_output.to_str().unwrap()),
        )
        .unwrap_err();
        assert_eq!(err, "No such file");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
