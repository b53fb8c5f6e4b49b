//! Script transpilation.
//!
//! sitepipe does not ship a transpiler. With no `[scripts] command`
//! configured, scripts pass through unchanged. Otherwise each script is piped
//! through the command (stdin to stdout), run from the project root, with the
//! source-relative path in `SITEPIPE_FILE`:
//!
//! ```toml
//! [scripts]
//! command = ["npx", "babel", "--presets", "@babel/preset-env"]
//! ```

use super::{Transform, TransformError};
use crate::files::SourceFile;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

pub struct ScriptTransform {
    command: Vec<String>,
    cwd: PathBuf,
}

impl ScriptTransform {
    pub fn new(command: Vec<String>, cwd: PathBuf) -> Self {
        Self { command, cwd }
    }

    fn run_command(&self, file: &SourceFile, input: Vec<u8>) -> Result<Vec<u8>, TransformError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| TransformError::Command("empty command".into()))?;
        let mut child = Command::new(program)
            .args(args)
            .current_dir(&self.cwd)
            .env("SITEPIPE_FILE", &file.relative)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| TransformError::Command(format!("cannot start `{program}`: {e}")))?;

        // Feed stdin from another thread so a chatty command cannot block on
        // a full stdout pipe while we are still writing.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransformError::Command("stdin unavailable".into()))?;
        let writer = thread::spawn(move || stdin.write_all(&input));

        let output = child.wait_with_output()?;
        let written = writer
            .join()
            .map_err(|_| TransformError::Command("stdin writer panicked".into()))?;
        if !output.status.success() {
            return Err(TransformError::Command(format!(
                "`{program}` exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        written?;
        Ok(output.stdout)
    }
}

impl Transform for ScriptTransform {
    fn transform(&self, file: &SourceFile, input: Vec<u8>) -> Result<Vec<u8>, TransformError> {
        if self.command.is_empty() {
            return Ok(input);
        }
        self.run_command(file, input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> SourceFile {
        SourceFile {
            path: PathBuf::from("src/assets/scripts/main.js"),
            relative: PathBuf::from("assets/scripts/main.js"),
        }
    }

    #[test]
    fn no_command_passes_through() {
        let transform = ScriptTransform::new(Vec::new(), PathBuf::from("."));
        let out = transform.transform(&file(), b"const a = () => 1\n".to_vec()).unwrap();
        assert_eq!(out, b"const a = () => 1\n");
    }

    #[cfg(unix)]
    #[test]
    fn command_output_replaces_input() {
        let command = vec!["tr".to_string(), "a-z".to_string(), "A-Z".to_string()];
        let transform = ScriptTransform::new(command, std::env::temp_dir());
        let out = transform.transform(&file(), b"let x\n".to_vec()).unwrap();
        assert_eq!(out, b"LET X\n");
    }

    #[cfg(unix)]
    #[test]
    fn command_sees_relative_file_name() {
        let command = vec![
            "sh".to_string(),
            "-c".to_string(),
            "cat >/dev/null; printf %s \"$SITEPIPE_FILE\"".to_string(),
        ];
        let transform = ScriptTransform::new(command, std::env::temp_dir());
        let out = transform.transform(&file(), b"x".to_vec()).unwrap();
        assert_eq!(out, b"assets/scripts/main.js");
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_is_an_error() {
        let command = vec!["sh".to_string(), "-c".to_string(), "echo boom >&2; exit 3".to_string()];
        let transform = ScriptTransform::new(command, std::env::temp_dir());
        let err = transform.transform(&file(), b"x".to_vec()).unwrap_err();
        assert!(err.to_string().contains("boom"), "{err}");
    }

    #[test]
    fn missing_program_is_an_error() {
        let command = vec!["sitepipe-no-such-transpiler".to_string()];
        let transform = ScriptTransform::new(command, std::env::temp_dir());
        assert!(matches!(
            transform.transform(&file(), b"x".to_vec()),
            Err(TransformError::Command(_))
        ));
    }
}
