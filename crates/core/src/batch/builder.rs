//! Groups work items into batch-compatible remote jobs.

use std::collections::HashMap;

use super::types::{Batch, GenerationParams, JobInput, WorkItem};

/// Deterministic compatibility key of an item under the given defaults.
///
/// Two items share a key iff their merged parameters are identical and
/// they carry the same audio prompt (or both carry none). Floats are
/// compared by bit pattern.
pub fn compatibility_key<T>(item: &WorkItem<T>, defaults: &GenerationParams) -> String {
    let params = item.effective_params(defaults);
    let seed = params
        .seed
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none".to_string());
    let prompt = item
        .audio_prompt
        .as_ref()
        .map(|p| p.fingerprint())
        .unwrap_or_else(|| "none".to_string());

    [
        format!("seed:{}", seed),
        format!("temp:{:08x}", params.temperature.to_bits()),
        format!("top_p:{:08x}", params.top_p.to_bits()),
        format!("top_k:{}", params.top_k),
        format!("guidance:{:08x}", params.guidance_scale.to_bits()),
        format!("tokens:{}", params.max_new_tokens),
        format!("fmt:{}", params.output_format),
        format!("prompt:{}", prompt),
    ]
    .join("|")
}

/// Partition `items` into batches of at most `batch_size` compatible items.
///
/// Groups are ordered by first appearance and keep input order internally;
/// each group is split into consecutive chunks. A `batch_size` of 0 is
/// treated as 1.
pub fn build_batches<T>(
    items: &[WorkItem<T>],
    defaults: &GenerationParams,
    batch_size: usize,
) -> Vec<Batch> {
    let batch_size = batch_size.max(1);

    let mut group_of_key: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let key = compatibility_key(item, defaults);
        let group = *group_of_key.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(index);
    }

    let mut batches = Vec::new();
    for group in groups {
        for chunk in group.chunks(batch_size) {
            let first = &items[chunk[0]];
            let params = first.effective_params(defaults);
            let input = JobInput {
                texts: chunk.iter().map(|&i| items[i].text.clone()).collect(),
                params: params.clone(),
                audio_prompt: first.audio_prompt.as_ref().map(|p| p.base64.clone()),
                audio_prompt_transcript: first
                    .audio_prompt
                    .as_ref()
                    .and_then(|p| p.transcript.clone()),
            };

            batches.push(Batch {
                index: batches.len(),
                item_indices: chunk.to_vec(),
                params,
                input,
            });
        }
    }

    batches
}
