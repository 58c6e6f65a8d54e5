//! Work time prediction for a new feature.

use serde::{Deserialize, Serialize};

use crate::{Client, LlmError, Prompt, strip_code_fence};

const PREDICTION_MAX_TOKENS: u32 = 600;
const PREDICTION_TEMPERATURE: f32 = 0.2;
const PREDICTION_SYSTEM: &str = "You are an assistant that predicts software development time.";

/// Past feature with its attributed time, in hours.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalFeature {
    pub name: String,
    pub actual_work_hours: f64,
    pub total_elapsed_hours: f64,
}

/// Input for a prediction.
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub description: String,
    pub history: Vec<HistoricalFeature>,
}

/// Predicted actual work time for a new feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub predicted_hours: f64,
    pub reason: String,
}

impl Client {
    /// Predict the actual work time of a described feature from history.
    pub async fn predict(&self, input: &PredictionRequest) -> Result<Prediction, LlmError> {
        let text = self.complete(build_prompt(input)).await?;
        parse_prediction(&text)
    }
}

fn build_prompt(input: &PredictionRequest) -> Prompt {
    let mut lines = Vec::new();
    lines.push("Past features and their measured time:".to_string());
    for feature in &input.history {
        lines.push(format!(
            "- {}: actual_work_hours={:.2}, total_elapsed_hours={:.2}",
            feature.name, feature.actual_work_hours, feature.total_elapsed_hours
        ));
    }
    lines.push(String::new());
    lines.push(
        "actual_work_hours excludes breaks between work sessions; total_elapsed_hours spans \
         first to last commit."
            .to_string(),
    );
    lines.push(format!(
        "Predict the actual work hours for a new feature: {}",
        input.description.trim()
    ));
    lines.push("Base the prediction on similar features and their actual_work_hours.".to_string());
    lines.push(
        "Return strict JSON: {\"predictedTimeHours\": 8.5, \"reason\": \"...\"}".to_string(),
    );
    Prompt {
        system: Some(PREDICTION_SYSTEM),
        user: lines.join("\n"),
        max_tokens: PREDICTION_MAX_TOKENS,
        temperature: PREDICTION_TEMPERATURE,
    }
}

fn parse_prediction(text: &str) -> Result<Prediction, LlmError> {
    #[derive(Deserialize)]
    struct Payload {
        #[serde(rename = "predictedTimeHours")]
        predicted_time_hours: f64,
        reason: String,
    }

    let payload: Payload = serde_json::from_str(strip_code_fence(text))
        .map_err(|err| LlmError::InvalidResponse(err.to_string()))?;
    if !payload.predicted_time_hours.is_finite() || payload.predicted_time_hours < 0.0 {
        return Err(LlmError::InvalidResponse(format!(
            "prediction out of range: {}",
            payload.predicted_time_hours
        )));
    }
    Ok(Prediction {
        predicted_hours: payload.predicted_time_hours,
        reason: payload.reason.trim().to_string(),
    })
}
