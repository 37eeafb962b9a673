// Main daemon service implementation

use super::PressureTrigger;
use crate::clock::Clock;
use crate::config::Config;
use crate::monitor::SnapshotSource;
use crate::policy::{ActionContext, CooldownGate, Plugin, PluginRet, PolicyContext};
use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a single evaluation cycle ended with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A previous action's cooldown is still running; nothing evaluated
    CoolingDown,
    /// Trigger did not fire
    Idle,
    /// Every plugin ran without taking action
    Continued,
    /// A plugin acted and its cooldown has elapsed
    Stopped,
}

/// Daemon service that evaluates the plugin chain under pressure
pub struct DaemonService {
    check_interval: Duration,
    ruleset: String,
    source: Box<dyn SnapshotSource>,
    trigger: PressureTrigger,
    plugins: Vec<Box<dyn Plugin>>,
    clock: Arc<dyn Clock>,
    gate: CooldownGate,
    last_kill: Option<Instant>,
    kills: u64,
    running: Arc<AtomicBool>,
}

impl DaemonService {
    /// Create a new daemon service
    pub fn new(
        config: &Config,
        source: Box<dyn SnapshotSource>,
        trigger: PressureTrigger,
        plugins: Vec<Box<dyn Plugin>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            check_interval: config.check_interval,
            ruleset: config.ruleset.clone(),
            source,
            trigger,
            plugins,
            clock,
            gate: CooldownGate::default(),
            last_kill: None,
            kills: 0,
            // Cycles may run before `run` is called (tests, one-shot use)
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get the running flag for signal handling
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub const fn kills(&self) -> u64 {
        self.kills
    }

    /// Main run loop
    pub fn run(&mut self) -> Result<()> {
        self.print_startup_info();

        self.running.store(true, Ordering::SeqCst);
        self.setup_signal_handlers()?;

        while self.running.load(Ordering::SeqCst) {
            if let Err(e) = self.run_cycle() {
                log::error!("Error in main loop: {e:#}");
            }

            if self.running.load(Ordering::SeqCst) {
                self.clock.sleep(self.check_interval);
            }
        }

        log::info!(
            "IOCost Guard shutting down gracefully ({} kill(s) this run)",
            self.kills
        );
        Ok(())
    }

    /// Setup signal handlers for graceful shutdown
    fn setup_signal_handlers(&self) -> Result<()> {
        let running = Arc::clone(&self.running);

        // Handle SIGTERM and SIGINT
        ctrlc::set_handler(move || {
            log::info!("Received shutdown signal");
            running.store(false, Ordering::SeqCst);
        })
        .map_err(|e| anyhow!("Failed to set signal handler: {}", e))?;

        Ok(())
    }

    fn print_startup_info(&self) {
        log::info!("=== IOCost Guard v{} starting ===", env!("CARGO_PKG_VERSION"));
        log::info!("Trigger: {}", self.trigger.describe());
        for plugin in &self.plugins {
            log::info!("Plugin: {}", plugin.name());
        }
        log::info!(
            "Evaluation interval: {}s",
            self.check_interval.as_secs()
        );
        log::info!("==========================================");
    }

    /// Refresh the snapshot, check the trigger and run the plugin chain once.
    ///
    /// When a plugin stops the chain, its cooldown is waited out before returning.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let now = self.clock.now();
        if self.gate.is_active(now) {
            log::debug!(
                "In cooldown period ({:.1}s remaining)",
                self.gate.remaining(now).as_secs_f64()
            );
            return Ok(CycleOutcome::CoolingDown);
        }

        let snapshot = self
            .source
            .refresh()
            .context("Failed to refresh cgroup snapshot")?;

        if !self.trigger.fired(&snapshot) {
            return Ok(CycleOutcome::Idle);
        }

        let ctx = PolicyContext {
            snapshot,
            action: ActionContext::new(self.ruleset.clone(), self.trigger.describe()),
        };

        for plugin in &mut self.plugins {
            match plugin.run(&ctx) {
                PluginRet::Continue => {
                    log::debug!("{} took no action", plugin.name());
                }
                PluginRet::Stop { cooldown } => {
                    log::info!("{} took action, stopping the chain", plugin.name());
                    self.last_kill = Some(now);
                    self.kills += 1;

                    if !cooldown.is_zero() {
                        log::info!("Post-action delay: {:.1}s", cooldown.as_secs_f64());
                        self.gate.arm(self.clock.now(), cooldown);
                        if !self.gate.wait(self.clock.as_ref(), &self.running) {
                            log::info!("Cooldown interrupted by shutdown");
                        }
                    }
                    return Ok(CycleOutcome::Stopped);
                }
            }
        }

        if let Some(last) = self.last_kill {
            log::debug!(
                "No action taken; last kill {:.1}s ago",
                self.clock.now().saturating_duration_since(last).as_secs_f64()
            );
        }
        Ok(CycleOutcome::Continued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cgroup::{
        CgroupContext, CgroupMetrics, CgroupPath, CgroupPattern, CgroupSnapshot, Pressure,
        SystemPressure,
    };
    use crate::clock::ManualClock;
    use crate::config::{ConfigError, PluginArgs};
    use crate::daemon::PressureResource;
    use crate::killer::{KillId, KillMechanism};
    use crate::monitor::MonitoredResources;
    use crate::policy::{KillIoCost, PluginConstructionContext};
    use std::path::Path;
    use std::sync::Mutex;

    const FS: &str = "/sys/fs/cgroup";

    /// Returns the same snapshot every cycle, counting refreshes
    struct StaticSource {
        snapshot: Arc<CgroupSnapshot>,
        refreshes: Arc<Mutex<u32>>,
    }

    impl SnapshotSource for StaticSource {
        fn refresh(&mut self) -> Result<Arc<CgroupSnapshot>> {
            *self.refreshes.lock().unwrap() += 1;
            Ok(Arc::clone(&self.snapshot))
        }
    }

    /// Plugin returning a fixed result, logging its name when run
    struct ScriptedPlugin {
        name: &'static str,
        ret: PluginRet,
        runs: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Plugin for ScriptedPlugin {
        fn name(&self) -> &str {
            self.name
        }

        fn init(
            &mut self,
            _resources: &mut MonitoredResources,
            _args: &PluginArgs,
            _context: &PluginConstructionContext,
        ) -> Result<(), ConfigError> {
            Ok(())
        }

        fn run(&mut self, _ctx: &PolicyContext) -> PluginRet {
            self.runs.lock().unwrap().push(self.name);
            self.ret
        }
    }

    struct AlwaysKills;

    impl KillMechanism for AlwaysKills {
        fn try_to_kill_cgroup(&self, _path: &Path, _recursive: bool, _dry: bool) -> Option<KillId> {
            Some(KillId::generate())
        }

        fn log_kill(
            &self,
            _target: &CgroupPath,
            _metrics: &CgroupMetrics,
            _action: &ActionContext,
            _kill_id: &KillId,
            _dry: bool,
        ) {
        }
    }

    fn snapshot(io_avg10: f64) -> Arc<CgroupSnapshot> {
        Arc::new(CgroupSnapshot::new(
            vec![CgroupContext::new(
                CgroupPath::new(FS, "workload.slice/app"),
                CgroupMetrics {
                    io_cost_rate: 10.0,
                    ..CgroupMetrics::default()
                },
            )],
            SystemPressure {
                memory: None,
                io: Some(Pressure {
                    avg10: io_avg10,
                    ..Pressure::default()
                }),
            },
        ))
    }

    fn service(
        io_avg10: f64,
        plugins: Vec<Box<dyn Plugin>>,
        clock: Arc<ManualClock>,
    ) -> (DaemonService, Arc<Mutex<u32>>) {
        let refreshes = Arc::new(Mutex::new(0));
        let source = StaticSource {
            snapshot: snapshot(io_avg10),
            refreshes: Arc::clone(&refreshes),
        };
        let trigger = PressureTrigger::new(PressureResource::Io, 50.0, None);
        let service = DaemonService::new(
            &Config::default(),
            Box::new(source),
            trigger,
            plugins,
            clock,
        );
        (service, refreshes)
    }

    fn scripted(
        name: &'static str,
        ret: PluginRet,
        runs: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Box<dyn Plugin> {
        Box::new(ScriptedPlugin {
            name,
            ret,
            runs: Arc::clone(runs),
        })
    }

    #[test]
    fn test_below_threshold_is_idle() {
        let runs = Arc::new(Mutex::new(Vec::new()));
        let clock = Arc::new(ManualClock::new());
        let (mut service, _) = service(
            10.0,
            vec![scripted("a", PluginRet::Continue, &runs)],
            clock,
        );

        assert_eq!(service.run_cycle().unwrap(), CycleOutcome::Idle);
        assert!(runs.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stop_halts_the_chain() {
        let runs = Arc::new(Mutex::new(Vec::new()));
        let clock = Arc::new(ManualClock::new());
        let stop = PluginRet::Stop {
            cooldown: Duration::ZERO,
        };
        let (mut service, _) = service(
            90.0,
            vec![
                scripted("first", PluginRet::Continue, &runs),
                scripted("second", stop, &runs),
                scripted("third", PluginRet::Continue, &runs),
            ],
            Arc::clone(&clock),
        );

        assert_eq!(service.run_cycle().unwrap(), CycleOutcome::Stopped);
        assert_eq!(*runs.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(service.kills(), 1);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_all_continue() {
        let runs = Arc::new(Mutex::new(Vec::new()));
        let clock = Arc::new(ManualClock::new());
        let (mut service, _) = service(
            90.0,
            vec![
                scripted("first", PluginRet::Continue, &runs),
                scripted("second", PluginRet::Continue, &runs),
            ],
            clock,
        );

        assert_eq!(service.run_cycle().unwrap(), CycleOutcome::Continued);
        assert_eq!(*runs.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(service.kills(), 0);
    }

    #[test]
    fn test_kill_waits_out_post_action_delay() {
        let clock = Arc::new(ManualClock::new());
        let mut plugin = KillIoCost::new(Box::new(AlwaysKills));
        let args: PluginArgs = [
            ("cgroup".to_string(), "workload.slice/app".to_string()),
            ("post_action_delay".to_string(), "5".to_string()),
        ]
        .into_iter()
        .collect();
        plugin
            .init(
                &mut MonitoredResources::default(),
                &args,
                &PluginConstructionContext::new(FS),
            )
            .unwrap();

        let (mut service, _) = service(90.0, vec![Box::new(plugin)], Arc::clone(&clock));

        assert_eq!(service.run_cycle().unwrap(), CycleOutcome::Stopped);
        assert!(clock.elapsed() >= Duration::from_secs(5));
    }

    #[test]
    fn test_interrupted_cooldown_blocks_next_cycle() {
        let runs = Arc::new(Mutex::new(Vec::new()));
        let clock = Arc::new(ManualClock::new());
        let stop = PluginRet::Stop {
            cooldown: Duration::from_secs(30),
        };
        let (mut service, refreshes) =
            service(90.0, vec![scripted("a", stop, &runs)], Arc::clone(&clock));

        service.running_flag().store(false, Ordering::SeqCst);
        assert_eq!(service.run_cycle().unwrap(), CycleOutcome::Stopped);
        assert_eq!(clock.elapsed(), Duration::ZERO);

        assert_eq!(service.run_cycle().unwrap(), CycleOutcome::CoolingDown);
        assert_eq!(*refreshes.lock().unwrap(), 1);
        assert_eq!(runs.lock().unwrap().len(), 1);

        clock.advance(Duration::from_secs(30));
        assert_eq!(service.run_cycle().unwrap(), CycleOutcome::Stopped);
        assert_eq!(*refreshes.lock().unwrap(), 2);
    }

    #[test]
    fn test_largest_post_action_delay_does_not_overflow() {
        let clock = Arc::new(ManualClock::new());
        let mut plugin = KillIoCost::new(Box::new(AlwaysKills));
        let args: PluginArgs = [
            ("cgroup".to_string(), "workload.slice/app".to_string()),
            ("post_action_delay".to_string(), i64::MAX.to_string()),
        ]
        .into_iter()
        .collect();
        plugin
            .init(
                &mut MonitoredResources::default(),
                &args,
                &PluginConstructionContext::new(FS),
            )
            .unwrap();

        let (mut service, _) = service(90.0, vec![Box::new(plugin)], Arc::clone(&clock));
        service.running_flag().store(false, Ordering::SeqCst);

        assert_eq!(service.run_cycle().unwrap(), CycleOutcome::Stopped);
        assert_eq!(service.run_cycle().unwrap(), CycleOutcome::CoolingDown);
    }

    #[test]
    fn test_cgroup_trigger_uses_snapshot() {
        let runs = Arc::new(Mutex::new(Vec::new()));
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new());
        let source = StaticSource {
            snapshot: snapshot(90.0),
            refreshes: Arc::default(),
        };
        // The app cgroup has no io pressure file, so nothing fires
        let pattern = CgroupPattern::new(FS, "workload.slice/app").unwrap();
        let trigger = PressureTrigger::new(PressureResource::Io, 50.0, Some(pattern));
        let mut service = DaemonService::new(
            &Config::default(),
            Box::new(source),
            trigger,
            vec![scripted("a", PluginRet::Continue, &runs)],
            clock,
        );

        assert_eq!(service.run_cycle().unwrap(), CycleOutcome::Idle);
    }
}
