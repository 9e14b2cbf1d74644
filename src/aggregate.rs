//! Response aggregation - consensus merge and narrative synthesis
//!
//! Everything here is side-effect free. Malformed confidences (missing,
//! NaN, infinite, out of range) are normalised, never reported as errors.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use crate::classifier::{Classification, Tag};
use crate::types::{meta, AgentId, Priority, Request, Response};

/// One response per agent, as produced by a collaboration round
pub type ResponseMap = HashMap<AgentId, Response>;

/// Confidence assumed when an agent did not report a usable one
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Above this, a synthesis is described as highly confident
const HIGH_CONFIDENCE: f32 = 0.9;

pub const NO_RESPONSE: &str = "No response available";
pub const NO_VALID_RESPONSES: &str = "No valid responses available";

/// Ranking key for consensus. Missing and NaN rank below every number,
/// infinities rank as the extremes.
fn rank(confidence: Option<f32>) -> Option<f32> {
    confidence.filter(|c| !c.is_nan())
}

/// Whether `candidate` strictly beats `current`
fn outranks(candidate: Option<f32>, current: Option<f32>) -> bool {
    match (rank(candidate), rank(current)) {
        (Some(a), Some(b)) => a.partial_cmp(&b) == Some(Ordering::Greater),
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Confidence usable in arithmetic: missing/NaN become the default and the
/// rest is clamped into `[0, 1]`.
pub fn normalized_confidence(confidence: Option<f32>) -> f32 {
    match rank(confidence) {
        Some(c) => c.clamp(0.0, 1.0),
        None => DEFAULT_CONFIDENCE,
    }
}

/// Merge several agent → response maps into one.
///
/// For every agent id present in any input the highest-confidence response
/// wins; ties keep the response seen first (earlier map wins).
pub fn consensus(rounds: &[ResponseMap]) -> ResponseMap {
    let mut merged: ResponseMap = HashMap::new();

    for round in rounds {
        for (agent, response) in round {
            match merged.get(agent) {
                Some(current) if !outranks(response.confidence, current.confidence) => {}
                _ => {
                    merged.insert(agent.clone(), response.clone());
                }
            }
        }
    }

    for (agent, best) in &merged {
        debug!(agent = %agent, confidence = ?best.confidence, "Consensus winner");
    }
    merged
}

/// Highest-confidence response in a list, first one on ties
pub fn best_of(responses: &[Response]) -> Option<&Response> {
    let mut best: Option<&Response> = None;
    for response in responses {
        match best {
            Some(current) if !outranks(response.confidence, current.confidence) => {}
            _ => best = Some(response),
        }
    }
    best
}

/// Mean of normalised confidences, `0.0` for no input
pub fn mean_confidence(responses: &[Response]) -> f32 {
    if responses.is_empty() {
        return 0.0;
    }
    let total: f32 = responses.iter().map(|r| normalized_confidence(r.confidence)).sum();
    total / responses.len() as f32
}

fn headline(content: &str) -> &str {
    let line = content.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    match line.char_indices().nth(80) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

/// Combine the ordered results of one cascade into a single narrative
/// response attributed to the orchestrator itself.
pub fn synthesize(request: &Request, results: &[Response]) -> Response {
    if results.is_empty() {
        return Response::new(AgentId::synthesis(), NO_RESPONSE, 0.0)
            .with_metadata(meta::STATUS, meta::STATUS_FINAL);
    }

    let overall = mean_confidence(results);
    let label = if results
        .iter()
        .any(|r| normalized_confidence(r.confidence) > HIGH_CONFIDENCE)
    {
        "highly confident"
    } else {
        "well-researched"
    };

    let mut out = String::new();
    out.push_str("Cascade synthesis\n\n");
    out.push_str(&format!("Original query: \"{}\"\n\n", request.text));

    out.push_str("Agent insights:\n");
    for r in results {
        out.push_str(&format!("- {}: {}\n", r.agent, headline(&r.content)));
    }

    out.push_str("\nIntegrated response:\n");
    out.push_str(&format!(
        "Based on analysis from {} specialised agents, the request was examined from each \
         perspective they cover and their findings were folded into one answer. The collective \
         assessment suggests a {} approach, with attention to the implications each agent raised.\n",
        results.len(),
        label
    ));

    out.push_str("\nSummary:\n");
    out.push_str(&format!("- Agents consulted: {}\n", results.len()));
    out.push_str(&format!("- Overall confidence: {:.1}%\n", overall * 100.0));

    Response::new(AgentId::synthesis(), out, overall)
        .with_metadata(meta::STATUS, meta::STATUS_FINAL)
}

/// Join the contents of several answers to the same request
pub fn combine(responses: &[Response]) -> String {
    let valid: Vec<&str> = responses
        .iter()
        .map(|r| r.content.as_str())
        .filter(|c| !c.trim().is_empty())
        .collect();

    match valid.as_slice() {
        [] => NO_VALID_RESPONSES.to_string(),
        [only] => only.to_string(),
        many => format!("Collaborative response: {}", many.join(" | ")),
    }
}

/// Merge answers from agents that handled the same request side by side.
///
/// Security plus creative requests get a balanced combination, critical
/// requests keep the most comprehensive (longest) answer, anything else is
/// combined.
pub fn synthesize_collaborative(classification: &Classification, responses: &[Response]) -> Response {
    let content = match responses {
        [] => NO_RESPONSE.to_string(),
        [only] => only.content.clone(),
        _ if classification.tags.contains(&Tag::Security)
            && classification.tags.contains(&Tag::Creative) =>
        {
            format!(
                "Based on both security and creative considerations: {}",
                combine(responses)
            )
        }
        // max_by_key keeps the last maximum; reversing keeps the first
        _ if classification.priority == Priority::Critical => responses
            .iter()
            .rev()
            .max_by_key(|r| r.content.len())
            .map(|r| r.content.clone())
            .unwrap_or_default(),
        _ => combine(responses),
    };

    Response::new(AgentId::synthesis(), content, mean_confidence(responses))
        .with_metadata(meta::STATUS, meta::STATUS_FINAL)
}
