// handlers/dashboard/insight.rs - POST /dashboard/insight
//
// Streams AI insights over the current dashboard metrics as server-sent
// events. The stream never fails mid-response: generator errors become the
// fallback message.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};

use crate::app::AppState;
use crate::handlers::dashboard::home::chart_data;
use crate::insight::{self, build_prompt, with_fallback, InsightError, InsightInput};

/// POST /dashboard/insight - `insight` events carry text deltas, `done` ends the stream
pub async fn insight_post(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (enrollments_per_course, student_growth_over_time) = chart_data(state.learning.as_ref()).await;
    let input = InsightInput {
        enrollments_per_course,
        student_growth_over_time,
    };

    let deltas = match build_prompt(&input) {
        Ok(prompt) => match state.insight.generate(prompt).await {
            Ok(deltas) => deltas,
            Err(e) => insight::failed(e),
        },
        Err(e) => insight::failed(InsightError::Payload(e.to_string())),
    };

    let events = with_fallback(deltas)
        .map(|text| Ok::<_, Infallible>(Event::default().event("insight").data(text)))
        .chain(stream::once(async { Ok::<_, Infallible>(Event::default().event("done").data("")) }));

    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}
