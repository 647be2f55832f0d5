// SPDX-License-Identifier: MIT

//! Cycle Supervisor (spec §4.E): spawns and monitors the external agent
//! lead process, debounces board changes, and respawns on pending change
//! under a bounded turn budget.
//!
//! Every piece of FSM state (`teamActive`, `pendingBoardChange`,
//! `lastSpawnTime`) lives inside one Tokio task reached only through
//! `mpsc::Sender<SupervisorCommand>`, so none of it needs a lock: external
//! callers only ever send a command and await a reply.

use crate::governor::TurnGovernor;
use chrono::Utc;
use clamban_storage::{TeamState, TeamStateStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

/// Idle → RUNNING debounce (spec §5).
pub const IDLE_DEBOUNCE: Duration = Duration::from_secs(3);
/// PENDING → next RUNNING debounce, measured from child exit (spec §5).
pub const RESPAWN_DEBOUNCE: Duration = Duration::from_secs(1);
/// Minimum spawn-to-exit time below which the supervisor refuses to respawn.
pub const CRASH_GUARD_WINDOW: Duration = Duration::from_secs(5);
/// Terminate-then-kill escalation window.
pub const TERMINATE_KILL_WINDOW: Duration = Duration::from_secs(5);
/// Default per-cycle turn allocation cap handed to the child process.
pub const DEFAULT_CYCLE_TURN_CAP: i64 = 50;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("supervisor task is gone")]
    TaskGone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Stopped,
    Idle,
    Running,
    Pending,
}

/// Configuration for one supervised team (spec §6 "agent child process
/// interface").
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub team: String,
    pub project_dir: PathBuf,
    pub model: String,
    pub max_turns: i64,
    pub agent_command: String,
    pub prompt: String,
}

/// Recognized stdout event kinds (spec §6). Modeled as a sum type rather
/// than dynamic dispatch.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum AgentStreamEvent {
    #[serde(rename = "system")]
    System { subtype: Option<String>, session_id: Option<String>, model: Option<String> },
    #[serde(rename = "assistant")]
    Assistant { message: serde_json::Value },
    #[serde(rename = "result")]
    Result { num_turns: Option<i64>, total_cost_usd: Option<f64>, subtype: Option<String> },
    #[serde(other)]
    Unknown,
}

enum SupervisorCommand {
    Start { config: SupervisorConfig, reply: oneshot::Sender<()> },
    Stop { reply: oneshot::Sender<()> },
    BoardChanged,
    /// A debounce timer firing; carries the epoch it was armed under so a
    /// superseded timer is a silent no-op (coalescing, testable property 9).
    DebounceElapsed { epoch: u64 },
    ChildExited { turns: Option<i64> },
    State { reply: oneshot::Sender<SupervisorState> },
}

/// A handle to the supervisor task; commands are sent over a channel so
/// every FSM mutation happens on a single consuming task (no locks around
/// `teamActive`/`pendingBoardChange`/`lastSpawnTime`).
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<SupervisorCommand>,
}

impl SupervisorHandle {
    pub async fn start(&self, config: SupervisorConfig) -> Result<(), SupervisorError> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(SupervisorCommand::Start { config, reply })
            .await
            .map_err(|_| SupervisorError::TaskGone)?;
        reply_rx.await.map_err(|_| SupervisorError::TaskGone)
    }

    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(SupervisorCommand::Stop { reply })
            .await
            .map_err(|_| SupervisorError::TaskGone)?;
        reply_rx.await.map_err(|_| SupervisorError::TaskGone)
    }

    pub async fn notify_board_changed(&self) -> Result<(), SupervisorError> {
        self.tx
            .send(SupervisorCommand::BoardChanged)
            .await
            .map_err(|_| SupervisorError::TaskGone)
    }

    pub async fn state(&self) -> Result<SupervisorState, SupervisorError> {
        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(SupervisorCommand::State { reply })
            .await
            .map_err(|_| SupervisorError::TaskGone)?;
        reply_rx.await.map_err(|_| SupervisorError::TaskGone)
    }
}

/// Observer callbacks, captured at construction and never replaced.
pub struct SupervisorObservers {
    pub on_log: Box<dyn Fn(&str, &str) + Send + Sync>,
    pub on_exit: Box<dyn Fn(&str) + Send + Sync>,
}

impl Default for SupervisorObservers {
    fn default() -> Self {
        Self { on_log: Box::new(|_, _| {}), on_exit: Box::new(|_| {}) }
    }
}

/// Owns the FSM. `run()` drives it forever on its own Tokio task; every
/// mutable field below is private to this struct and touched only inside
/// `handle_command`.
pub struct CycleSupervisor {
    state: SupervisorState,
    config: Option<SupervisorConfig>,
    team_active: bool,
    pending_board_change: bool,
    last_spawn_time: Option<tokio::time::Instant>,
    child_pid: Option<u32>,
    governor: Option<Arc<TurnGovernor>>,
    debounce_epoch: u64,
    observers: Arc<SupervisorObservers>,
    team_state: Arc<TeamStateStore>,
    rx: mpsc::Receiver<SupervisorCommand>,
    self_tx: mpsc::Sender<SupervisorCommand>,
}

impl CycleSupervisor {
    /// `team_state` persists `leadPid`/`startedAt`/`stoppedAt` to
    /// `state/<team>.json` (spec §6) so a liveness check can combine the
    /// in-memory child handle with the persisted pid across a hot-reload
    /// (spec §4.E, §7: "running = childAlive || persistedPid liveness").
    pub fn new(
        observers: SupervisorObservers,
        team_state: Arc<TeamStateStore>,
    ) -> (Self, SupervisorHandle) {
        let (tx, rx) = mpsc::channel(64);
        let handle = SupervisorHandle { tx: tx.clone() };
        (
            Self {
                state: SupervisorState::Stopped,
                config: None,
                team_active: false,
                pending_board_change: false,
                last_spawn_time: None,
                child_pid: None,
                governor: None,
                debounce_epoch: 0,
                observers: Arc::new(observers),
                team_state,
                rx,
                self_tx: tx,
            },
            handle,
        )
    }

    /// Persist the team's cycle state, leaving whichever field isn't
    /// specified as it was on disk.
    fn persist_state(&self, team: &str, mutate: impl FnOnce(&mut TeamState)) {
        let mut state = self.team_state.read(team).unwrap_or_default();
        mutate(&mut state);
        if let Err(e) = self.team_state.write(team, &state) {
            tracing::warn!(team, error = %e, "failed to persist team cycle state");
        }
    }

    pub async fn run(mut self) {
        while let Some(cmd) = self.rx.recv().await {
            self.handle_command(cmd).await;
        }
    }

    async fn handle_command(&mut self, cmd: SupervisorCommand) {
        match cmd {
            SupervisorCommand::Start { config, reply } => {
                self.start(config).await;
                let _ = reply.send(());
            }
            SupervisorCommand::Stop { reply } => {
                self.stop().await;
                let _ = reply.send(());
            }
            SupervisorCommand::BoardChanged => self.on_board_changed().await,
            SupervisorCommand::DebounceElapsed { epoch } => self.on_debounce_elapsed(epoch).await,
            SupervisorCommand::ChildExited { turns } => self.on_child_exited(turns).await,
            SupervisorCommand::State { reply } => {
                let _ = reply.send(self.state);
            }
        }
    }

    fn arm_debounce(&mut self, after: Duration) {
        self.debounce_epoch += 1;
        let epoch = self.debounce_epoch;
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(SupervisorCommand::DebounceElapsed { epoch }).await;
        });
    }

    async fn start(&mut self, config: SupervisorConfig) {
        self.governor = Some(Arc::new(TurnGovernor::new(config.max_turns, None, |_, _| {}, |_, _| {})));
        self.team_active = true;
        self.pending_board_change = false;
        self.persist_state(&config.team, |s| {
            s.lead_pid = None;
            s.started_at = Some(Utc::now());
            s.stopped_at = None;
        });
        self.config = Some(config);
        self.spawn_cycle().await;
    }

    async fn stop(&mut self) {
        self.team_active = false;
        self.pending_board_change = false;
        let team = self.config.as_ref().map(|c| c.team.clone());
        match self.child_pid.take() {
            Some(pid) => terminate_then_kill(pid).await,
            None => {
                // Lost the in-memory handle across a hot-reload; escalate
                // against the pid persisted by the process that spawned it.
                if let Some(team) = &team {
                    if let Ok(persisted) = self.team_state.read(team) {
                        if let Some(pid) = persisted.lead_pid {
                            if process_alive(pid) {
                                terminate_then_kill(pid).await;
                            }
                        }
                    }
                }
            }
        }
        if let Some(team) = team {
            self.persist_state(&team, |s| {
                s.lead_pid = None;
                s.stopped_at = Some(Utc::now());
            });
        }
        self.state = SupervisorState::Stopped;
    }

    /// spec §5: a board change while IDLE/STOPPED debounces for
    /// `IDLE_DEBOUNCE` before spawning; a change while RUNNING is recorded
    /// as pending and acted on at the next exit; a change while already
    /// PENDING is absorbed (coalescing).
    async fn on_board_changed(&mut self) {
        if !self.team_active {
            return;
        }
        match self.state {
            SupervisorState::Idle | SupervisorState::Stopped => {
                self.arm_debounce(IDLE_DEBOUNCE);
            }
            SupervisorState::Running => {
                self.pending_board_change = true;
                self.state = SupervisorState::Pending;
            }
            SupervisorState::Pending => {}
        }
    }

    async fn on_debounce_elapsed(&mut self, epoch: u64) {
        if epoch != self.debounce_epoch || !self.team_active {
            return;
        }
        if self.state == SupervisorState::Running || self.state == SupervisorState::Pending {
            return;
        }
        self.spawn_cycle().await;
    }

    async fn spawn_cycle(&mut self) {
        let governor = match &self.governor {
            Some(g) => g.clone(),
            None => return,
        };
        let cycle_turns = governor.allocate_cycle_budget(DEFAULT_CYCLE_TURN_CAP);
        let config = match &self.config {
            Some(c) => c.clone(),
            None => return,
        };

        if cycle_turns == 0 {
            self.halt(&config.team).await;
            return;
        }

        (self.observers.on_log)(
            &config.team,
            &format!("[cycle start] used={} allocated={}", governor.used(), cycle_turns),
        );
        self.last_spawn_time = Some(tokio::time::Instant::now());
        self.pending_board_change = false;
        self.state = SupervisorState::Running;

        match spawn_child(&config, cycle_turns, self.observers.clone()).await {
            Ok((pid, join)) => {
                self.child_pid = Some(pid);
                self.persist_state(&config.team, |s| s.lead_pid = Some(pid));
                let tx = self.self_tx.clone();
                let team = config.team.clone();
                let observers = self.observers.clone();
                tokio::spawn(async move {
                    let outcome = join.await;
                    (observers.on_log)(&team, &format!("[cycle exit] {outcome:?}"));
                    let turns = match outcome {
                        AgentRunOutcome::Turns(n) => Some(n),
                        AgentRunOutcome::NoTurns => None,
                    };
                    let _ = tx.send(SupervisorCommand::ChildExited { turns }).await;
                });
            }
            Err(e) => {
                (self.observers.on_log)(&config.team, &format!("[spawn failed] {e}"));
                self.halt(&config.team).await;
            }
        }
    }

    async fn on_child_exited(&mut self, turns: Option<i64>) {
        self.child_pid = None;
        let team = self.config.as_ref().map(|c| c.team.clone()).unwrap_or_default();
        self.persist_state(&team, |s| s.lead_pid = None);

        if let (Some(governor), Some(n)) = (&self.governor, turns) {
            governor.record_turns(n);
        }

        if !self.team_active {
            self.state = SupervisorState::Stopped;
            (self.observers.on_exit)(&team);
            return;
        }

        let elapsed = self.last_spawn_time.map(|t| t.elapsed()).unwrap_or(CRASH_GUARD_WINDOW);
        if elapsed < CRASH_GUARD_WINDOW {
            tracing::warn!(team = %team, "child exited inside crash-guard window; not respawning");
            self.halt(&team).await;
            return;
        }

        let governor_exhausted = self.governor.as_ref().map(|g| !g.can_spawn()).unwrap_or(true);
        if governor_exhausted {
            self.halt(&team).await;
            return;
        }

        self.state = SupervisorState::Idle;
        if self.pending_board_change {
            self.arm_debounce(RESPAWN_DEBOUNCE);
        }
        (self.observers.on_exit)(&team);
    }

    async fn halt(&mut self, team: &str) {
        self.team_active = false;
        self.state = SupervisorState::Stopped;
        self.persist_state(team, |s| {
            s.lead_pid = None;
            s.stopped_at = Some(Utc::now());
        });
        (self.observers.on_exit)(team);
    }
}

#[derive(Debug)]
enum AgentRunOutcome {
    Turns(i64),
    NoTurns,
}

async fn spawn_child(
    config: &SupervisorConfig,
    cycle_turns: i64,
    observers: Arc<SupervisorObservers>,
) -> Result<(u32, impl std::future::Future<Output = AgentRunOutcome>), SupervisorError> {
    let mut cmd = Command::new(&config.agent_command);
    cmd.arg("--print")
        .arg("--output-format")
        .arg("stream-json")
        .arg("--max-turns")
        .arg(cycle_turns.to_string())
        .arg("--model")
        .arg(&config.model)
        .arg("--dangerously-skip-permissions")
        .current_dir(&config.project_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn()?;
    let pid = child.id().unwrap_or(0);

    if let Some(mut stdin) = child.stdin.take() {
        let prompt = config.prompt.clone();
        tokio::spawn(async move {
            let _ = stdin.write_all(prompt.as_bytes()).await;
            let _ = stdin.shutdown().await;
        });
    }

    let stdout = child.stdout.take();
    let team = config.team.clone();
    let fut = async move {
        let mut num_turns = None;
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match serde_json::from_str::<AgentStreamEvent>(&line) {
                    Ok(AgentStreamEvent::System { subtype, session_id, model }) => {
                        (observers.on_log)(
                            &team,
                            &format!(
                                "[system] subtype={} session={} model={}",
                                subtype.as_deref().unwrap_or("-"),
                                session_id.as_deref().unwrap_or("-"),
                                model.as_deref().unwrap_or("-"),
                            ),
                        );
                    }
                    Ok(AgentStreamEvent::Assistant { message }) => {
                        let summary = summarize_assistant_message(&message);
                        (observers.on_log)(&team, &format!("[assistant] {summary}"));
                    }
                    Ok(AgentStreamEvent::Result { num_turns: n, total_cost_usd, subtype }) => {
                        num_turns = n;
                        (observers.on_log)(
                            &team,
                            &format!(
                                "[result] subtype={} turns={} cost_usd={}",
                                subtype.as_deref().unwrap_or("-"),
                                n.map(|n| n.to_string()).as_deref().unwrap_or("-"),
                                total_cost_usd.map(|c| format!("{c:.4}")).as_deref().unwrap_or("-"),
                            ),
                        );
                    }
                    Ok(AgentStreamEvent::Unknown) => {
                        tracing::debug!(raw = %line, "unrecognized agent stdout event");
                    }
                    Err(_) => {
                        (observers.on_log)(&team, &format!("[unparseable] {line}"));
                    }
                }
            }
        }
        let _ = child.wait().await;
        match num_turns {
            Some(n) => AgentRunOutcome::Turns(n),
            None => AgentRunOutcome::NoTurns,
        }
    };
    Ok((pid, fut))
}

/// Truncated summary of an `assistant` stream-json message: text blocks and
/// tool-use names, joined, capped so one message can't flood the log tail.
fn summarize_assistant_message(message: &serde_json::Value) -> String {
    const MAX_LEN: usize = 240;
    let mut parts = Vec::new();
    if let Some(blocks) = message.get("content").and_then(|c| c.as_array()) {
        for block in blocks {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                        parts.push(text.to_string());
                    }
                }
                Some("tool_use") => {
                    let name = block.get("name").and_then(|n| n.as_str()).unwrap_or("tool");
                    parts.push(format!("<tool_use:{name}>"));
                }
                _ => {}
            }
        }
    }
    let mut summary = parts.join(" ");
    if summary.is_empty() {
        summary = message.to_string();
    }
    if summary.len() > MAX_LEN {
        let cut = summary
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|&i| i <= MAX_LEN)
            .last()
            .unwrap_or(0);
        summary.truncate(cut);
        summary.push('…');
    }
    summary
}

/// Terminate-then-kill escalation (spec §5), addressed by PID so it also
/// works after a hot-reload that lost the in-memory child handle.
async fn terminate_then_kill(pid: u32) {
    send_signal(pid, Signal::Term);
    tokio::time::sleep(TERMINATE_KILL_WINDOW).await;
    if process_alive(pid) {
        send_signal(pid, Signal::Kill);
    }
}

enum Signal {
    Term,
    Kill,
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: Signal) {
    use nix::sys::signal::{self, Signal as NixSignal};
    use nix::unistd::Pid;
    let sig = match signal {
        Signal::Term => NixSignal::SIGTERM,
        Signal::Kill => NixSignal::SIGKILL,
    };
    let _ = signal::kill(Pid::from_raw(pid as i32), sig);
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, _signal: Signal) {}

/// Liveness probe via signal 0 (spec §9: "checking liveness before each
/// [escalation] step"). Sending signal 0 does nothing but reports ESRCH
/// if the process is gone.
#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    false
}

/// Whether a team's lead agent is running, combining an in-memory child pid
/// (when this process spawned it) with a liveness check of the persisted
/// pid (spec §4.E, §7: `running = childAlive || (persistedPid &&
/// processAlive(persistedPid))`). Correct across a hot-reload that lost the
/// in-memory handle, since the persisted pid survives the restart.
pub fn team_is_running(team_state: &TeamStateStore, team: &str, child_alive: bool) -> bool {
    if child_alive {
        return true;
    }
    match team_state.read(team) {
        Ok(state) => state.lead_pid.is_some_and(process_alive),
        Err(_) => false,
    }
}

#[cfg(test)]
#[path = "cycle_tests.rs"]
mod tests;
