//! Crontab installation for the periodic update job.
//!
//! The schedule is a single daily `update-all` run. Installation is
//! idempotent: the current crontab is read back and left alone when the job
//! line is already present; otherwise the merged schedule is staged in the
//! `cron-schedule` scratch file and handed to `crontab`.

use std::io::Write;
use std::process::Stdio;

use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::fs;
use crate::paths::Paths;

const CRON_DAILY: &str = "0 0 * * *";

pub struct CronScheduler {
    paths: Paths,
}

impl CronScheduler {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    async fn run_crontab(&self, args: &[&str], stdout: Stdio) -> Result<std::process::Output> {
        let output = tokio::process::Command::new("crontab")
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| Error::Spawn {
                program: "crontab".into(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(Error::Subprocess {
                program: "crontab".into(),
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output)
    }

    async fn load_existing_schedule(&self) -> Result<String> {
        let output = self.run_crontab(&["-l"], Stdio::piped()).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Install the daily `update-all` job for the current executable, if it
    /// is not already scheduled.
    #[instrument(skip(self))]
    pub async fn ensure_update_job(&self) -> Result<()> {
        let exe = std::env::current_exe().map_err(|e| Error::Spawn {
            program: "git-bundle-server".into(),
            source: e,
        })?;

        let job = format!("{CRON_DAILY} \"{}\" \"update-all\"", exe.display());

        let schedule = self.load_existing_schedule().await?;
        if schedule.contains(&job) {
            debug!("update-all job already scheduled");
            return Ok(());
        }

        let mut merged = schedule;
        if !merged.is_empty() && !merged.ends_with('\n') {
            merged.push('\n');
        }
        merged.push_str(&job);
        merged.push('\n');

        let scratch = self.paths.cron_schedule_file();
        let lock = fs::write_lock_file(&scratch, |w| w.write_all(merged.as_bytes()))?;
        lock.commit()?;

        let scratch_str = scratch.to_string_lossy().into_owned();
        self.run_crontab(&[&scratch_str], Stdio::null()).await?;

        fs::delete_file(&scratch)?;

        info!("scheduled daily update-all job");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_line_shape() {
        // The schedule prefix is what cron parses; pin it.
        assert_eq!(CRON_DAILY.split_whitespace().count(), 5);
    }
}
