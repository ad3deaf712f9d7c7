use crate::error::MonitorError;
use crate::log_stream::LogSource;
use crate::types::{classify, render, CameraState, Transition};
use chrono::{DateTime, Local};
use log::{debug, info, trace, warn};
use std::future::Future;
use std::io::Write;

const BANNER: [&str; 3] = [
    "Starting Camera Monitor for macOS (Insta360 Specific)...",
    "Looking for 'Insta360 Link' session events.",
    "Press Ctrl+C to stop.",
];

/// Why the read loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    EndOfStream,
    Interrupted,
    Failed,
}

/// Reads log lines, prints a status line for each camera start/stop.
pub struct Monitor<W: Write> {
    out: W,
    show_raw: bool,
    clock: fn() -> DateTime<Local>,
    state: CameraState,
}

impl<W: Write> Monitor<W> {
    pub fn new(out: W, show_raw: bool) -> Self {
        Self {
            out,
            show_raw,
            clock: Local::now,
            state: CameraState::new(),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: fn() -> DateTime<Local>) -> Self {
        self.clock = clock;
        self
    }

    pub fn banner(&mut self) -> Result<(), MonitorError> {
        for line in BANNER {
            self.emit(line)?;
        }
        Ok(())
    }

    /// Print the single operator-facing error line.
    pub fn report(&mut self, err: &MonitorError) {
        debug!("Monitor failure: {:?}", err);
        let _ = self.emit(&format!("Error: {}", err));
    }

    /// Consume `source` until it closes, fails, or `shutdown` resolves.
    ///
    /// Every exit path asks the source to terminate. Failures are reported
    /// once and never propagated.
    pub async fn run<S, F>(&mut self, source: &mut S, shutdown: F) -> Exit
    where
        S: LogSource,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let exit = loop {
            // Ctrl+C also closes the child's stdout; the interrupt must win.
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    let _ = self.emit("\nStopping monitor...");
                    break Exit::Interrupted;
                }
                result = source.next_line() => {
                    match result {
                        Ok(Some(line)) => {
                            if let Err(e) = self.handle_line(&line) {
                                self.report(&e);
                                break Exit::Failed;
                            }
                        }
                        Ok(None) => {
                            info!("Log stream closed");
                            break Exit::EndOfStream;
                        }
                        Err(e) => {
                            self.report(&e);
                            break Exit::Failed;
                        }
                    }
                }
            }
        };

        self.stop(source);
        exit
    }

    fn handle_line(&mut self, line: &str) -> Result<(), MonitorError> {
        trace!("{}", line);

        let Some(event) = classify(line) else {
            return Ok(());
        };

        let at = (self.clock)();
        let since = self.state.since();
        match self.state.apply(event, at) {
            Transition::Changed => info!("Camera status changed to {}", event.status()),
            Transition::Repeated => debug!(
                "Camera reported {} again, unchanged since {:?}",
                event.status(),
                since
            ),
        }

        self.emit(&render(event, at))?;
        if self.show_raw {
            self.emit(&format!("Raw Log: {}", line.trim()))?;
        }
        Ok(())
    }

    fn stop<S: LogSource>(&mut self, source: &mut S) {
        match source.terminate() {
            Ok(()) => debug!("Requested log stream termination"),
            Err(e) => warn!("{}", e),
        }
    }

    fn emit(&mut self, line: &str) -> Result<(), MonitorError> {
        writeln!(self.out, "{}", line).map_err(MonitorError::WriteError)?;
        self.out.flush().map_err(MonitorError::WriteError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::VecDeque;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 5).unwrap()
    }

    /// Scripted source: yields `lines`, then fails, hangs, or closes.
    #[derive(Default)]
    struct FakeSource {
        lines: VecDeque<String>,
        fail_with: Option<String>,
        hang: bool,
        terminations: usize,
    }

    impl FakeSource {
        fn with_lines(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|l| l.to_string()).collect(),
                ..Default::default()
            }
        }
    }

    impl LogSource for FakeSource {
        async fn next_line(&mut self) -> Result<Option<String>, MonitorError> {
            if let Some(line) = self.lines.pop_front() {
                return Ok(Some(line));
            }
            if let Some(msg) = self.fail_with.take() {
                return Err(MonitorError::ReadError(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    msg,
                )));
            }
            if self.hang {
                std::future::pending::<()>().await;
            }
            Ok(None)
        }

        fn terminate(&mut self) -> Result<(), MonitorError> {
            self.terminations += 1;
            Ok(())
        }
    }

    async fn run_to_end(source: &mut FakeSource, show_raw: bool) -> (Exit, String) {
        let mut out = Vec::new();
        let exit = Monitor::new(&mut out, show_raw)
            .with_clock(fixed_time)
            .run(source, std::future::pending())
            .await;
        (exit, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn prints_started_for_added_input() {
        let mut source =
            FakeSource::with_lines(&["... Insta360 ... addInput: Insta360 Link ..."]);
        let (exit, output) = run_to_end(&mut source, false).await;

        assert_eq!(exit, Exit::EndOfStream);
        assert_eq!(output, "[2024-05-01 09:30:05] 🟢 Camera STARTED (Active)\n");
    }

    #[tokio::test]
    async fn prints_stopped_for_removed_input() {
        let mut source =
            FakeSource::with_lines(&["... Insta360 ... removeInput: Insta360 Link ..."]);
        let (_, output) = run_to_end(&mut source, false).await;

        assert_eq!(output, "[2024-05-01 09:30:05] 🔴 Camera STOPPED (Inactive)\n");
    }

    #[tokio::test]
    async fn ignores_other_devices() {
        let mut source =
            FakeSource::with_lines(&["... Logitech ... addInput: Logitech Webcam ..."]);
        let (_, output) = run_to_end(&mut source, false).await;

        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn end_of_stream_is_quiet_and_terminates() {
        let mut source = FakeSource::default();
        let (exit, output) = run_to_end(&mut source, false).await;

        assert_eq!(exit, Exit::EndOfStream);
        assert!(!output.contains("Error"));
        assert_eq!(source.terminations, 1);
    }

    #[tokio::test]
    async fn read_error_reports_once_and_terminates() {
        let mut source = FakeSource {
            fail_with: Some("broken pipe".to_string()),
            ..FakeSource::with_lines(&["Insta360 addInput: Insta360 Link"])
        };
        let (exit, output) = run_to_end(&mut source, false).await;

        assert_eq!(exit, Exit::Failed);
        assert_eq!(output.matches("Error:").count(), 1);
        assert!(output.contains("broken pipe"));
        assert!(output.starts_with("[2024-05-01 09:30:05] 🟢 Camera STARTED (Active)\n"));
        assert_eq!(source.terminations, 1);
    }

    #[tokio::test]
    async fn repeated_events_are_all_printed() {
        let mut source = FakeSource::with_lines(&[
            "Insta360 addInput: Insta360 Link",
            "Insta360 addInput: Insta360 Link",
            "Insta360 removeInput: Insta360 Link",
        ]);
        let (_, output) = run_to_end(&mut source, false).await;

        assert_eq!(output.matches("STARTED").count(), 2);
        assert_eq!(output.matches("STOPPED").count(), 1);
    }

    #[tokio::test]
    async fn raw_echo_follows_status_line() {
        let mut source = FakeSource::with_lines(&["  Insta360 removeInput: Insta360 Link  "]);
        let (_, output) = run_to_end(&mut source, true).await;

        assert_eq!(
            output,
            "[2024-05-01 09:30:05] 🔴 Camera STOPPED (Inactive)\n\
             Raw Log: Insta360 removeInput: Insta360 Link\n"
        );
    }

    #[tokio::test]
    async fn interrupt_prints_stop_message_and_terminates() {
        let mut source = FakeSource {
            hang: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        let exit = Monitor::new(&mut out, false)
            .run(&mut source, async {})
            .await;

        assert_eq!(exit, Exit::Interrupted);
        assert_eq!(String::from_utf8(out).unwrap(), "\nStopping monitor...\n");
        assert_eq!(source.terminations, 1);
    }

    #[tokio::test]
    async fn interrupt_wins_over_simultaneous_end_of_stream() {
        for _ in 0..50 {
            let mut source = FakeSource::default();
            let mut out = Vec::new();
            let exit = Monitor::new(&mut out, false)
                .run(&mut source, async {})
                .await;

            assert_eq!(exit, Exit::Interrupted);
            assert_eq!(String::from_utf8(out).unwrap(), "\nStopping monitor...\n");
            assert_eq!(source.terminations, 1);
        }
    }

    #[test]
    fn banner_lists_usage() {
        let mut out = Vec::new();
        Monitor::new(&mut out, false).banner().unwrap();
        let output = String::from_utf8(out).unwrap();

        assert_eq!(output.lines().count(), 3);
        assert!(output.contains("Press Ctrl+C to stop."));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn drives_a_real_child_process() {
        use crate::log_stream::LogStream;

        let mut stream = LogStream::spawn(
            "sh",
            &[
                "-c",
                "echo 'Df avconferenced [com.apple.cameracapture] addInput: Insta360 Link'; \
                 echo 'Df avconferenced [com.apple.cameracapture] addInput: FaceTime HD Camera'; \
                 echo 'Df avconferenced [com.apple.cameracapture] removeInput: Insta360 Link'",
            ],
        )
        .unwrap();

        let mut out = Vec::new();
        let exit = Monitor::new(&mut out, false)
            .with_clock(fixed_time)
            .run(&mut stream, std::future::pending())
            .await;

        assert_eq!(exit, Exit::EndOfStream);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[2024-05-01 09:30:05] 🟢 Camera STARTED (Active)\n\
             [2024-05-01 09:30:05] 🔴 Camera STOPPED (Inactive)\n"
        );
    }
}
