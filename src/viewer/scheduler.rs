//! Auto-rotation scheduler
//!
//! One background task owns the tick interval and the idle-resume timer.
//! Pausing takes effect synchronously: the tick path checks a shared flag, so
//! no tick lands after `pause` returns even if the task has not yet seen the
//! command.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Start,
    Stop,
    Pause,
    ResumeAfterIdle,
}

/// Handle to the rotation task; dropping it stops the task
#[derive(Debug)]
pub struct RotationScheduler {
    commands: mpsc::UnboundedSender<Command>,
    running: Arc<AtomicBool>,
    enabled: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl RotationScheduler {
    /// Spawn the scheduler on the current Tokio runtime, initially stopped
    pub fn spawn<F>(tick_interval: Duration, idle_resume: Duration, on_tick: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let (commands, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            commands,
            running: Arc::new(AtomicBool::new(false)),
            enabled: Arc::new(AtomicBool::new(false)),
            ticks: Arc::new(AtomicU64::new(0)),
            cancel: CancellationToken::new(),
        };

        let driver = Driver {
            tick_interval,
            idle_resume,
            running: Arc::clone(&scheduler.running),
            enabled: Arc::clone(&scheduler.enabled),
            ticks: Arc::clone(&scheduler.ticks),
            cancel: scheduler.cancel.clone(),
        };
        tokio::spawn(driver.run(rx, on_tick));

        scheduler
    }

    /// Enable auto-rotation and begin ticking one interval from now
    pub fn start(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        self.send(Command::Start);
    }

    /// Disable auto-rotation entirely
    pub fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        self.send(Command::Stop);
    }

    /// Halt ticking for a gesture; cancels any pending resume
    pub fn pause(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.send(Command::Pause);
    }

    /// Resume after the idle delay, if still enabled by then
    pub fn resume_after_idle(&self) {
        self.send(Command::ResumeAfterIdle);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Ticks delivered since spawn
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Stop the task and clear both timers
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.cancel.cancel();
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            log::trace!("rotation scheduler already stopped; dropping {command:?}");
        }
    }
}

impl Drop for RotationScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Driver {
    tick_interval: Duration,
    idle_resume: Duration,
    running: Arc<AtomicBool>,
    enabled: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run<F: Fn()>(self, mut rx: mpsc::UnboundedReceiver<Command>, on_tick: F) {
        let mut ticker = interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut resume_at: Option<Instant> = None;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                command = rx.recv() => match command {
                    Some(Command::Start) => {
                        resume_at = None;
                        ticker.reset();
                    }
                    Some(Command::Stop) | Some(Command::Pause) => resume_at = None,
                    Some(Command::ResumeAfterIdle) => {
                        resume_at = Some(Instant::now() + self.idle_resume);
                    }
                    None => break,
                },
                _ = sleep_until(resume_at.unwrap_or_else(Instant::now)), if resume_at.is_some() => {
                    resume_at = None;
                    if self.enabled.load(Ordering::SeqCst) {
                        self.running.store(true, Ordering::SeqCst);
                        ticker.reset();
                    }
                }
                _ = ticker.tick() => {
                    if self.running.load(Ordering::SeqCst) {
                        self.ticks.fetch_add(1, Ordering::SeqCst);
                        on_tick();
                    }
                }
            }
        }
        log::trace!("rotation scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn counting() -> (RotationScheduler, Arc<AtomicU64>) {
        let count = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&count);
        let scheduler = RotationScheduler::spawn(
            Duration::from_millis(100),
            Duration::from_millis(2000),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        (scheduler, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_until_started() {
        let (_scheduler, count) = counting();
        sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_tick_per_interval() {
        let (scheduler, count) = counting();
        scheduler.start();

        sleep(Duration::from_millis(350)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.tick_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_halts_immediately_and_resumes_after_idle() {
        let (scheduler, count) = counting();
        scheduler.start();
        sleep(Duration::from_millis(250)).await;
        let before = count.load(Ordering::SeqCst);

        scheduler.pause();
        scheduler.resume_after_idle();
        sleep(Duration::from_millis(1950)).await;
        assert_eq!(count.load(Ordering::SeqCst), before);
        assert!(!scheduler.is_running());

        sleep(Duration::from_millis(200)).await;
        assert!(scheduler.is_running());
        assert!(count.load(Ordering::SeqCst) > before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_gestures_restart_idle_window() {
        let (scheduler, count) = counting();
        scheduler.start();

        scheduler.pause();
        scheduler.resume_after_idle();
        sleep(Duration::from_millis(1500)).await;

        scheduler.pause();
        scheduler.resume_after_idle();
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(700)).await;
        assert!(count.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_resume() {
        let (scheduler, count) = counting();
        scheduler.start();
        scheduler.pause();
        scheduler.resume_after_idle();
        scheduler.stop();

        sleep(Duration::from_millis(3000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!scheduler.is_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_clears_timers() {
        let (scheduler, count) = counting();
        scheduler.start();
        scheduler.shutdown();

        sleep(Duration::from_millis(1000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
