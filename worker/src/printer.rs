use crate::WorkerError;
use async_trait::async_trait;
use std::path::Path;
use tracing::{info, instrument};

/// Abstraction over the physical print command, mocked in tests.
#[async_trait]
pub trait Printer: Send + Sync {
    async fn print(
        &self,
        path: &Path,
        copies: i32,
        printer_name: Option<&str>,
    ) -> Result<(), WorkerError>;
}

/// Prints through CUPS with `lp -n <copies> [-d <printer>] <file>`.
pub struct LpPrinter {
    default_printer: Option<String>,
}

impl LpPrinter {
    pub fn new(default_printer: Option<String>) -> Self {
        Self { default_printer }
    }
}

#[async_trait]
impl Printer for LpPrinter {
    #[instrument(skip(self, path), fields(path = %path.display()))]
    async fn print(
        &self,
        path: &Path,
        copies: i32,
        printer_name: Option<&str>,
    ) -> Result<(), WorkerError> {
        let mut command = tokio::process::Command::new("lp");
        command.arg("-n").arg(copies.to_string());

        if let Some(printer) = printer_name.or(self.default_printer.as_deref()) {
            command.arg("-d").arg(printer);
        }
        command.arg(path);

        let output = command
            .output()
            .await
            .map_err(|e| WorkerError::Print(format!("spawn lp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WorkerError::Print(format!(
                "lp exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        info!(copies, "Submitted document to printer");
        Ok(())
    }
}

/// Number of physical passes to print. BOTH means one color copy plus
/// one black & white copy per requested copy, so the count doubles.
pub fn physical_copies(print_type: &str, copies: i32) -> i32 {
    match print_type {
        "BOTH" => copies * 2,
        _ => copies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_doubles_the_copy_count() {
        assert_eq!(physical_copies("BW", 3), 3);
        assert_eq!(physical_copies("COLOR", 3), 3);
        assert_eq!(physical_copies("BOTH", 3), 6);
        assert_eq!(physical_copies("BOTH", 1), 2);
    }
}
