use serde::Serialize;

/// Lifecycle notifications emitted while a pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    StepStart {
        #[serde(rename = "stepId")]
        step_id: String,
    },
    /// The step returned, successfully or with a tolerated failure.
    StepFinish,
    /// A step failure aborted the run.
    StepError { message: String },
}

pub trait PipelineListener {
    fn on_event(&mut self, event: &PipelineEvent);
}

impl<F> PipelineListener for F
where
    F: FnMut(&PipelineEvent),
{
    fn on_event(&mut self, event: &PipelineEvent) {
        self(event)
    }
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl PipelineListener for NoopListener {
    fn on_event(&mut self, _event: &PipelineEvent) {}
}

/// Keeps every event in arrival order.
#[derive(Debug, Default, Clone)]
pub struct RecordingListener {
    pub events: Vec<PipelineEvent>,
}

impl PipelineListener for RecordingListener {
    fn on_event(&mut self, event: &PipelineEvent) {
        self.events.push(event.clone());
    }
}

/// Writes step progress through `log_status!`.
#[derive(Debug, Default, Clone)]
pub struct StatusLogListener {
    current: Option<String>,
}

impl PipelineListener for StatusLogListener {
    fn on_event(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::StepStart { step_id } => {
                crate::log_status!("step", "{} started", step_id);
                self.current = Some(step_id.clone());
            }
            PipelineEvent::StepFinish => {
                if let Some(step_id) = self.current.take() {
                    crate::log_status!("step", "{} finished", step_id);
                }
            }
            PipelineEvent::StepError { message } => {
                let step_id = self.current.take().unwrap_or_default();
                crate::log_status!("step", "{} failed: {}", step_id, message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tag() {
        let start = PipelineEvent::StepStart {
            step_id: "deploy".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&start).unwrap(),
            serde_json::json!({ "event": "step_start", "stepId": "deploy" })
        );
        assert_eq!(
            serde_json::to_value(PipelineEvent::StepFinish).unwrap(),
            serde_json::json!({ "event": "step_finish" })
        );
    }

    #[test]
    fn closures_are_listeners() {
        let mut seen = 0;
        {
            let mut listener = |_: &PipelineEvent| seen += 1;
            listener.on_event(&PipelineEvent::StepFinish);
            listener.on_event(&PipelineEvent::StepFinish);
        }
        assert_eq!(seen, 2);
    }
}
