//! Batch building integration tests through the public API.

use std::collections::HashSet;
use std::sync::Arc;

use voxbatch_core::{
    build_batches, compatibility_key, testing::fixtures, AudioPrompt, GenerationOverrides,
    GenerationParams, WorkItem,
};

fn mixed_items() -> Vec<WorkItem<usize>> {
    let prompt = Arc::new(AudioPrompt::new("UklGRg==", Some("[S1] Hallo".to_string())));
    let other_prompt = Arc::new(AudioPrompt::new("UklGRh==", Some("[S1] Hallo".to_string())));

    let mut items = fixtures::work_items(&["a", "b", "c", "d", "e", "f", "g", "h"]);
    items[1] = items[1].clone().with_audio_prompt(prompt.clone());
    items[2] = items[2]
        .clone()
        .with_overrides(GenerationOverrides::default().with_temperature(1.5));
    items[4] = items[4].clone().with_audio_prompt(prompt);
    items[5] = items[5].clone().with_audio_prompt(other_prompt);
    items[7] = items[7]
        .clone()
        .with_overrides(GenerationOverrides::default().with_output_format("mp3"));
    items
}

#[test]
fn test_batches_partition_input() {
    let items = mixed_items();
    let defaults = GenerationParams::default();

    for batch_size in 1..=4 {
        let batches = build_batches(&items, &defaults, batch_size);

        let mut seen = HashSet::new();
        for (i, batch) in batches.iter().enumerate() {
            assert_eq!(batch.index, i);
            assert!(!batch.is_empty());
            assert!(batch.len() <= batch_size);
            assert_eq!(batch.input.texts.len(), batch.len());
            for &index in &batch.item_indices {
                assert!(seen.insert(index), "item {} in two batches", index);
            }
        }
        assert_eq!(seen.len(), items.len());
    }
}

#[test]
fn test_members_share_compatibility_key() {
    let items = mixed_items();
    let defaults = GenerationParams::default();

    for batch in build_batches(&items, &defaults, 3) {
        let keys: HashSet<String> = batch
            .item_indices
            .iter()
            .map(|&i| compatibility_key(&items[i], &defaults))
            .collect();
        assert_eq!(keys.len(), 1);
    }
}

#[test]
fn test_groups_follow_first_appearance() {
    let items = mixed_items();
    let batches = build_batches(&items, &GenerationParams::default(), 3);

    let groups: Vec<Vec<usize>> = batches.iter().map(|b| b.item_indices.clone()).collect();
    assert_eq!(
        groups,
        vec![vec![0, 3, 6], vec![1, 4], vec![2], vec![5], vec![7]]
    );
}

#[test]
fn test_job_input_carries_prompt_and_params() {
    let items = mixed_items();
    let batches = build_batches(&items, &GenerationParams::default(), 3);

    let prompt_batch = &batches[1];
    assert_eq!(prompt_batch.input.audio_prompt.as_deref(), Some("UklGRg=="));
    assert_eq!(
        prompt_batch.input.audio_prompt_transcript.as_deref(),
        Some("[S1] Hallo")
    );
    assert_eq!(batches[2].input.params.temperature, 1.5);
    assert_eq!(batches[4].params.output_format, "mp3");
    assert!(batches[0].input.audio_prompt.is_none());
}

#[test]
fn test_defaults_feed_the_key() {
    let items = fixtures::work_items(&["a", "b"]);
    let warm = GenerationParams {
        temperature: 1.0,
        ..Default::default()
    };

    assert_ne!(
        compatibility_key(&items[0], &GenerationParams::default()),
        compatibility_key(&items[0], &warm)
    );
    assert_eq!(
        compatibility_key(&items[0], &warm),
        compatibility_key(&items[1], &warm)
    );
}
