//! Playback session - ties fetching, the timeline and alerts together.
//!
//! One session exists per model/mode. It is driven entirely through named
//! methods, so a harness can step it without any rendering environment.

use crate::alerts::{AlertAggregator, AlertMarker};
use crate::orchestrator::{DynamicParams, FetchedResult, Fidelity, RequestOrchestrator, SimulationError};
use crate::projector::Snapshot;
use crate::timeline::{TickTimer, TimelineController};
use metaflux_env::{PlaybackContext, SimulationTransport};

/// Fetch orchestration plus playback for a single model.
pub struct PlaybackSession<Ctx, T, Tm>
where
    Ctx: PlaybackContext,
    T: SimulationTransport,
    Tm: TickTimer,
{
    orchestrator: RequestOrchestrator<Ctx, T>,
    timeline: TimelineController<Tm>,
    alerts: AlertAggregator,
    fidelity: Option<Fidelity>,
}

impl<Ctx, T, Tm> PlaybackSession<Ctx, T, Tm>
where
    Ctx: PlaybackContext,
    T: SimulationTransport,
    Tm: TickTimer,
{
    pub fn new(orchestrator: RequestOrchestrator<Ctx, T>, timeline: TimelineController<Tm>) -> Self {
        Self {
            orchestrator,
            timeline,
            alerts: AlertAggregator::default(),
            fidelity: None,
        }
    }

    /// Fetches a result and starts playing it.
    ///
    /// On failure the previously loaded result, if any, stays in place.
    pub async fn simulate(&mut self, params: &DynamicParams) -> Result<Fidelity, SimulationError> {
        let fetched = self.orchestrator.run_dynamic_simulation(params).await?;
        let fidelity = fetched.fidelity;
        self.accept(fetched, params.total_time);
        Ok(fidelity)
    }

    /// Loads an already fetched result.
    ///
    /// Raises the toxicity notification for the first alert, if any.
    pub fn accept(&mut self, fetched: FetchedResult, total_time: f64) {
        self.alerts = AlertAggregator::new(&fetched.result, total_time);
        if let Some(notification) = self.alerts.primary_notification() {
            self.orchestrator.notifier().notify(notification);
        }
        self.fidelity = Some(fetched.fidelity);
        self.timeline.load(fetched.result, total_time);
    }

    /// Discards the result after a model or mode change.
    pub fn reset_for_model_change(&mut self) {
        self.timeline.clear();
        self.alerts = AlertAggregator::default();
        self.fidelity = None;
    }

    /// Projects the current cursor.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.timeline.snapshot()
    }

    /// Alerts within `window` simulated hours of the cursor.
    pub fn alerts_near_cursor(&self, window: f64) -> Vec<&AlertMarker> {
        let t = self.timeline.state().current_time;
        self.alerts.markers_between(t - window, t + window).collect()
    }

    pub fn timeline(&self) -> &TimelineController<Tm> {
        &self.timeline
    }

    pub fn timeline_mut(&mut self) -> &mut TimelineController<Tm> {
        &mut self.timeline
    }

    pub fn alerts(&self) -> &AlertAggregator {
        &self.alerts
    }

    /// Fidelity of the loaded result, `None` before the first success.
    pub fn fidelity(&self) -> Option<Fidelity> {
        self.fidelity
    }

    pub fn orchestrator(&self) -> &RequestOrchestrator<Ctx, T> {
        &self.orchestrator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NotificationTopic, Notifier};
    use crate::orchestrator::tests::{QueueTransport, Reply};
    use crate::result::tests::response_with_time;
    use crate::timeline::tests::CountingTimer;
    use crate::timeline::{PlaybackPhase, TimelineConfig};
    use metaflux_env::{EnvError, TokioContext, ToxicityAlert};
    use std::sync::Arc;

    fn session(
        replies: Vec<Reply>,
    ) -> (
        PlaybackSession<TokioContext, QueueTransport, CountingTimer>,
        tokio::sync::mpsc::UnboundedReceiver<crate::notify::Notification>,
    ) {
        let (notifier, rx) = Notifier::channel();
        let orchestrator = RequestOrchestrator::new(
            TokioContext::shared(),
            Arc::new(QueueTransport::new(replies)),
            notifier,
        );
        let timeline = TimelineController::new(TimelineConfig::default(), CountingTimer::default());
        (PlaybackSession::new(orchestrator, timeline), rx)
    }

    fn params(total_time: f64) -> DynamicParams {
        DynamicParams {
            total_time,
            ..DynamicParams::default()
        }
    }

    #[tokio::test]
    async fn test_simulate_loads_and_plays() {
        let (mut session, _rx) = session(vec![Reply::Ok(response_with_time(vec![0.0, 1.0, 2.0]))]);
        let fidelity = session.simulate(&params(2.0)).await.unwrap();

        assert_eq!(fidelity, Fidelity::Full);
        assert_eq!(session.fidelity(), Some(Fidelity::Full));
        assert_eq!(session.timeline().phase(), PlaybackPhase::Playing);
        assert_eq!(session.timeline().total_time(), 2.0);
        assert_eq!(session.snapshot().unwrap().index, 0);
    }

    #[tokio::test]
    async fn test_first_alert_raises_toxicity_notification() {
        let mut response = response_with_time(vec![0.0, 1.0, 2.0, 3.0]);
        response.toxicity_alerts = vec![
            ToxicityAlert {
                time: 2.5,
                byproduct: "EX_etoh_e".to_string(),
                concentration: 25.0,
            },
            ToxicityAlert {
                time: 1.5,
                byproduct: "EX_ac_e".to_string(),
                concentration: 49.0,
            },
        ];
        let (mut session, mut rx) = session(vec![Reply::Ok(response)]);
        session.simulate(&params(3.0)).await.unwrap();

        let note = rx.try_recv().unwrap();
        assert_eq!(note.topic, NotificationTopic::Toxicity);
        assert!(note.message.contains("EX_ac_e"));
        assert!(rx.try_recv().is_err());
        assert_eq!(session.alerts().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_result() {
        let (mut session, _rx) = session(vec![
            Reply::Ok(response_with_time(vec![0.0, 1.0])),
            Reply::Fail(EnvError::network("refused")),
            Reply::Fail(EnvError::network("refused")),
        ]);
        session.simulate(&params(1.0)).await.unwrap();
        session.timeline_mut().seek(0.5);

        assert!(session.simulate(&params(1.0)).await.is_err());
        assert_eq!(session.timeline().state().current_time, 0.5);
        assert!(session.timeline().result().is_some());
    }

    #[tokio::test]
    async fn test_alerts_near_cursor() {
        let mut response = response_with_time(vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        response.toxicity_alerts = vec![
            ToxicityAlert {
                time: 1.0,
                byproduct: "EX_ac_e".to_string(),
                concentration: 50.0,
            },
            ToxicityAlert {
                time: 3.5,
                byproduct: "EX_ac_e".to_string(),
                concentration: 55.0,
            },
        ];
        let (mut session, _rx) = session(vec![Reply::Ok(response)]);
        session.simulate(&params(4.0)).await.unwrap();
        session.timeline_mut().pause();
        session.timeline_mut().seek(3.0);

        let near = session.alerts_near_cursor(0.5);
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].event.time, 3.5);
    }

    #[tokio::test]
    async fn test_model_change_resets() {
        let (mut session, _rx) = session(vec![Reply::Ok(response_with_time(vec![0.0, 1.0]))]);
        session.simulate(&params(1.0)).await.unwrap();
        session.reset_for_model_change();

        assert_eq!(session.timeline().phase(), PlaybackPhase::Stopped);
        assert!(session.fidelity().is_none());
        assert!(session.alerts().is_empty());
        assert!(session.timeline().timer().live.is_empty());
    }
}
