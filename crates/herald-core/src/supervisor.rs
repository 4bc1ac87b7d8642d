//! Worker lifecycle: launch, observe, restart.
//!
//! All restart decisions funnel through the control-line reader and the exit
//! monitor. The `is_running` flag plus a generation counter serialize them,
//! so a late event from an old worker can never touch a newer one.

use std::{process::Stdio, sync::Arc, time::Instant};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
    sync::{watch, Mutex},
    time::sleep,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::Config,
    control::ControlSignal,
    credentials::{has_credential, is_valid_phone_number, normalize_phone_number},
    errors::Error,
    Result,
};

/// Supervisor lifecycle phases. `Stopped` is terminal: it is only reached by
/// a deliberate shutdown or a clean (code 0, no reset) worker exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Launching,
    Running,
    Restarting,
    Stopped,
}

struct WorkerHandle {
    args: Vec<String>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct State {
    is_running: bool,
    generation: u64,
    current: Option<WorkerHandle>,
}

#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: Arc<Config>,
    forward_args: Vec<String>,
    started_at: Instant,
    state: Mutex<State>,
    phase_tx: watch::Sender<Phase>,
}

impl Supervisor {
    pub fn new(cfg: Arc<Config>, forward_args: Vec<String>) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Idle);
        Self {
            inner: Arc::new(Inner {
                cfg,
                forward_args,
                started_at: Instant::now(),
                state: Mutex::new(State::default()),
                phase_tx,
            }),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.inner.phase_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.inner.phase_tx.subscribe()
    }

    /// Seconds since this supervisor process came up. This is what an
    /// `uptime` control query is answered with; it does not measure the
    /// worker.
    pub fn uptime_secs(&self) -> f64 {
        self.inner.started_at.elapsed().as_secs_f64()
    }

    /// Arguments the current worker was launched with, if one is in flight.
    pub async fn current_args(&self) -> Option<Vec<String>> {
        let st = self.inner.state.lock().await;
        st.current.as_ref().map(|w| w.args.clone())
    }

    pub async fn generation(&self) -> u64 {
        self.inner.state.lock().await.generation
    }

    /// Launch a worker. A no-op while one is already starting or running, so
    /// at most one worker is ever in flight.
    pub async fn start(&self) -> Result<()> {
        let mut st = self.inner.state.lock().await;
        if st.is_running {
            debug!("start ignored: worker already in flight");
            return Ok(());
        }

        self.set_phase(Phase::Launching);

        let args = self.launch_args()?;

        let mut cmd = Command::new(&self.inner.cfg.worker_path);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn()?;
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let pid = child.id();

        let cancel = CancellationToken::new();
        st.generation += 1;
        st.is_running = true;
        st.current = Some(WorkerHandle {
            args: args.clone(),
            cancel: cancel.clone(),
        });
        let generation = st.generation;
        drop(st);

        info!(pid, generation, "worker launched");
        self.set_phase(Phase::Running);

        // Control-line reader. Owns the worker's stdin for uptime replies.
        if let (Some(stdout), Some(stdin)) = (stdout, stdin) {
            let sup = self.clone();
            let token = cancel.clone();
            tokio::spawn(async move {
                sup.control_loop(stdout, stdin, generation, token).await;
            });
        }

        // Exit monitor: reaps the child and applies the restart policy.
        let sup = self.clone();
        tokio::spawn(async move {
            sup.monitor(child, generation, cancel).await;
        });

        Ok(())
    }

    /// Resolves once the supervisor reaches its terminal `Stopped` phase.
    pub async fn wait_stopped(&self) {
        let mut rx = self.inner.phase_tx.subscribe();
        while *rx.borrow_and_update() != Phase::Stopped {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Deliberate teardown: kill the current worker (if any) without
    /// scheduling a replacement.
    pub async fn shutdown(&self) {
        let mut st = self.inner.state.lock().await;
        if let Some(worker) = st.current.take() {
            worker.cancel.cancel();
        }
        st.is_running = false;
        drop(st);
        self.set_phase(Phase::Stopped);
    }

    /// Forwarded argv, plus pairing flags when no credential exists yet.
    /// Re-evaluated on every launch: once pairing has produced a credential,
    /// restarts no longer carry the flags.
    fn launch_args(&self) -> Result<Vec<String>> {
        let cfg = &self.inner.cfg;
        let mut args = self.inner.forward_args.clone();

        if has_credential(&cfg.session_file)? {
            return Ok(args);
        }

        let Some(raw) = cfg.bot_number.as_deref() else {
            return Err(Error::Config(
                "no session credential found and BOT_NUMBER is not set; set BOT_NUMBER \
                 to the operator phone number (example: +5219992095479) to pair this host"
                    .to_string(),
            ));
        };

        let number = normalize_phone_number(raw);
        if !is_valid_phone_number(&number) {
            return Err(Error::Config(format!(
                "BOT_NUMBER {raw:?} is not a usable phone number; include the country \
                 code, example: +5219992095479"
            )));
        }

        info!(%number, "no credential on disk, pairing by phone number");
        args.push(format!("--phone={number}"));
        args.push("--method=code".to_string());
        Ok(args)
    }

    async fn control_loop(
        &self,
        stdout: ChildStdout,
        mut stdin: ChildStdin,
        generation: u64,
        cancel: CancellationToken,
    ) {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(l)) => l,
                        // Worker stdout closed; the exit monitor takes it from here.
                        Ok(None) => break,
                        Err(e) => {
                            warn!("control channel read failed: {e}");
                            break;
                        }
                    };

                    match ControlSignal::parse(&line) {
                        Some(ControlSignal::UptimeQuery) => {
                            let reply = format!("{:.3}\n", self.uptime_secs());
                            if let Err(e) = stdin.write_all(reply.as_bytes()).await {
                                warn!("uptime reply failed: {e}");
                            } else if let Err(e) = stdin.flush().await {
                                warn!("uptime reply flush failed: {e}");
                            }
                        }
                        Some(ControlSignal::Reset) => {
                            info!(generation, "worker requested reset");
                            self.handle_reset(generation).await;
                            break;
                        }
                        None => debug!(%line, "ignoring unrecognized control message"),
                    }
                }
            }
        }
    }

    /// Planned restart: detach the old worker's observers, kill it, and
    /// schedule a relaunch. Not an anomaly, so no warn-level noise.
    async fn handle_reset(&self, generation: u64) {
        let mut st = self.inner.state.lock().await;
        if st.generation != generation {
            return; // stale signal from a superseded worker
        }
        if let Some(worker) = st.current.take() {
            // The monitor kills and reaps without applying exit policy.
            worker.cancel.cancel();
        }
        st.is_running = false;
        drop(st);

        self.set_phase(Phase::Restarting);
        self.schedule_restart(generation);
    }

    async fn monitor(&self, mut child: Child, generation: u64, cancel: CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => {
                // Planned teardown; the reset/shutdown path already updated state.
                if let Err(e) = child.kill().await {
                    warn!("failed to kill worker: {e}");
                }
            }
            status = child.wait() => {
                match status {
                    Ok(status) => self.handle_exit(status, generation).await,
                    Err(e) => error!("waiting on worker failed: {e}"),
                }
            }
        }
    }

    /// Restart policy: exit code 0 with no reset involved is a deliberate
    /// stop; anything else (non-zero code, signal death) earns one scheduled
    /// relaunch. Retries are unbounded with a fixed delay.
    async fn handle_exit(&self, status: std::process::ExitStatus, generation: u64) {
        let mut st = self.inner.state.lock().await;
        if st.generation != generation {
            return; // exit event from a superseded worker
        }
        st.is_running = false;
        st.current = None;

        if status.code() == Some(0) {
            drop(st);
            info!("worker stopped cleanly, not restarting");
            self.set_phase(Phase::Stopped);
            return;
        }
        drop(st);

        warn!(%status, "worker died, restarting in {:?}", self.inner.cfg.restart_delay);
        self.set_phase(Phase::Restarting);
        self.schedule_restart(generation);
    }

    /// Relaunch after the configured delay. The task carries the generation
    /// it was scheduled for; if a newer worker exists (or one is already
    /// running) by the time the timer fires, it does nothing.
    fn schedule_restart(&self, scheduled_for: u64) {
        let sup = self.clone();
        tokio::spawn(async move {
            sleep(sup.inner.cfg.restart_delay).await;
            {
                let st = sup.inner.state.lock().await;
                if st.generation != scheduled_for || st.is_running {
                    debug!(scheduled_for, "dropping stale restart timer");
                    return;
                }
            }
            if let Err(e) = sup.start().await {
                error!("relaunch failed: {e}");
                sup.set_phase(Phase::Stopped);
            }
        });
    }

    fn set_phase(&self, phase: Phase) {
        self.inner.phase_tx.send_replace(phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, path::{Path, PathBuf}, time::Duration};

    fn scratch(name: &str) -> PathBuf {
        let dir = PathBuf::from(format!("/tmp/herald-sup-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn config(dir: &Path, with_credential: bool, delay_ms: u64) -> Arc<Config> {
        let session_file = dir.join("creds.json");
        if with_credential {
            fs::write(&session_file, "{}").unwrap();
        }
        Arc::new(Config {
            auth_dir: dir.to_path_buf(),
            session_file,
            bot_number: None,
            gateway_addr: "127.0.0.1:0".to_string(),
            worker_path: PathBuf::from("/bin/sh"),
            restart_delay: Duration::from_millis(delay_ms),
            command_prefix: ".".to_string(),
            control_reply_timeout: Duration::from_secs(1),
        })
    }

    fn sh_supervisor(dir: &Path, script: &str, delay_ms: u64) -> Supervisor {
        Supervisor::new(
            config(dir, true, delay_ms),
            vec!["-c".to_string(), script.to_string()],
        )
    }

    async fn wait_phase(sup: &Supervisor, want: Phase) {
        tokio::time::timeout(Duration::from_secs(5), async {
            let mut rx = sup.subscribe();
            while *rx.borrow_and_update() != want {
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {want:?}, at {:?}", sup.phase()));
    }

    #[tokio::test]
    async fn clean_exit_stops_without_restart() {
        let dir = scratch("clean");
        let sup = sh_supervisor(&dir, "exit 0", 20);

        sup.start().await.unwrap();
        sup.wait_stopped().await;

        // Give any (incorrect) restart timer a chance to fire.
        sleep(Duration::from_millis(100)).await;
        assert_eq!(sup.phase(), Phase::Stopped);
        assert_eq!(sup.generation().await, 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn crash_restarts_with_the_same_arguments() {
        let dir = scratch("crash");
        // First run crashes, second exits clean.
        let script = format!(
            "if [ -e {d}/ran ]; then exit 0; else touch {d}/ran; exit 3; fi",
            d = dir.display()
        );
        let sup = sh_supervisor(&dir, &script, 20);

        sup.start().await.unwrap();
        sup.wait_stopped().await;

        assert_eq!(sup.generation().await, 2);

        // Credential present, so no pairing flags were ever synthesized.
        let args = sup.launch_args().unwrap();
        assert_eq!(args, ["-c".to_string(), script]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn start_is_single_flight() {
        let dir = scratch("single");
        let sup = sh_supervisor(&dir, "sleep 2", 20);

        let (a, b) = tokio::join!(sup.start(), sup.start());
        a.unwrap();
        b.unwrap();
        assert_eq!(sup.generation().await, 1);

        sup.shutdown().await;
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn unrecognized_control_lines_change_nothing() {
        let dir = scratch("noise");
        let sup = sh_supervisor(&dir, "echo hello; echo 42; sleep 0.4; exit 0", 20);

        sup.start().await.unwrap();
        wait_phase(&sup, Phase::Running).await;
        sleep(Duration::from_millis(200)).await;

        // Still the same worker, still running.
        assert_eq!(sup.phase(), Phase::Running);
        assert_eq!(sup.generation().await, 1);

        sup.wait_stopped().await;
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn uptime_query_gets_a_numeric_reply() {
        let dir = scratch("uptime");
        let script = format!(
            "echo uptime; read reply; echo \"$reply\" > {d}/reply; exit 0",
            d = dir.display()
        );
        let sup = sh_supervisor(&dir, &script, 20);

        sup.start().await.unwrap();
        sup.wait_stopped().await;

        let reply = fs::read_to_string(dir.join("reply")).unwrap();
        let secs: f64 = reply.trim().parse().unwrap();
        assert!(secs >= 0.0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn reset_relaunches_a_fresh_worker() {
        let dir = scratch("reset");
        // First run asks for a reset and hangs; the relaunch exits clean.
        let script = format!(
            "if [ -e {d}/ran ]; then exit 0; else touch {d}/ran; echo reset; sleep 5; fi",
            d = dir.display()
        );
        let sup = sh_supervisor(&dir, &script, 20);

        sup.start().await.unwrap();
        sup.wait_stopped().await;

        assert_eq!(sup.generation().await, 2);
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn stale_restart_timer_never_fires_against_a_newer_worker() {
        let dir = scratch("stale");
        // First run resets; later runs just hang until shutdown.
        let script = format!(
            "if [ -e {d}/ran ]; then sleep 5; else touch {d}/ran; echo reset; sleep 5; fi",
            d = dir.display()
        );
        let sup = sh_supervisor(&dir, &script, 300);

        sup.start().await.unwrap();
        wait_phase(&sup, Phase::Restarting).await;

        // Launch manually before the scheduled timer fires.
        sup.start().await.unwrap();
        assert_eq!(sup.generation().await, 2);

        // The stale timer elapses without superseding the new worker.
        sleep(Duration::from_millis(600)).await;
        assert_eq!(sup.generation().await, 2);
        assert_eq!(sup.phase(), Phase::Running);

        sup.shutdown().await;
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn pairing_flags_synthesized_only_without_credential() {
        let dir = scratch("pairing");
        let cfg = Arc::new(Config {
            bot_number: Some("5219992095479".to_string()),
            ..(*config(&dir, false, 20)).clone()
        });
        let sup = Supervisor::new(cfg, vec!["--verbose".to_string()]);

        let args = sup.launch_args().unwrap();
        assert_eq!(
            args,
            ["--verbose", "--phone=+5219992095479", "--method=code"]
        );

        // Once the credential exists the flags disappear.
        fs::write(dir.join("creds.json"), "{}").unwrap();
        let args = sup.launch_args().unwrap();
        assert_eq!(args, ["--verbose"]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_number_without_credential_is_a_config_error() {
        let dir = scratch("nonumber");
        let sup = Supervisor::new(config(&dir, false, 20), Vec::new());
        assert!(matches!(sup.launch_args(), Err(Error::Config(_))));

        let dir2 = scratch("badnumber");
        let cfg = Arc::new(Config {
            bot_number: Some("12345".to_string()),
            ..(*config(&dir2, false, 20)).clone()
        });
        let sup = Supervisor::new(cfg, Vec::new());
        assert!(matches!(sup.launch_args(), Err(Error::Config(_))));

        let _ = fs::remove_dir_all(&dir);
        let _ = fs::remove_dir_all(&dir2);
    }
}
