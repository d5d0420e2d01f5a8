//! Tests for `FrameBufferSession`.

use std::time::Duration;

use futures::executor::LocalPool;
use futures::future::join_all;
use web_time::Instant;

use super::scripted::{ScriptedDecoder, source};
use crate::state::{BufferConfig, FrameBufferSession};

fn config(prefetch_radius: usize, max_cache: usize, prefetch_concurrency: usize) -> BufferConfig {
    BufferConfig {
        prefetch_radius,
        max_cache,
        prefetch_concurrency,
        fps: 10,
    }
}

fn session(
    pool: &LocalPool,
    decoder: &ScriptedDecoder,
    config: BufferConfig,
) -> FrameBufferSession<ScriptedDecoder> {
    FrameBufferSession::new(decoder.clone(), pool.spawner(), config)
}

/// Complete decodes until the session stops issuing new ones.
fn settle_all(pool: &mut LocalPool, decoder: &ScriptedDecoder) {
    loop {
        pool.run_until_stalled();
        if decoder.complete_all() == 0 {
            break;
        }
    }
}

#[test]
fn test_concurrent_requests_decode_once() {
    let mut pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(0, 10, 6));
    session.open(source("clip", 10));

    let requests: Vec<_> = (0..5).map(|_| session.request(5)).collect();
    pool.run_until_stalled();
    assert_eq!(decoder.calls_for(5), 1);
    assert!(session.is_inflight(5));

    assert!(decoder.complete(5));
    let results = pool.run_until(join_all(requests));

    assert!(results.iter().all(|bitmap| bitmap.as_ref().is_some_and(|b| b.index == 5)));
    assert_eq!(decoder.calls_for(5), 1);
    assert!(session.is_resident(5));
    assert!(!session.is_inflight(5));
}

#[test]
fn test_resident_request_resolves_without_decode() {
    let mut pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(0, 10, 6));
    session.open(source("clip", 3));
    settle_all(&mut pool, &decoder);
    assert!(session.is_ready());

    let bitmap = pool.run_until(session.request(0));
    assert!(bitmap.is_some());
    assert_eq!(decoder.calls_for(0), 1);
}

#[test]
fn test_prefetch_at_start_covers_window_current_first() {
    let mut pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(60, 180, 6));
    session.open(source("clip", 100));

    // Current frame goes out before any batch
    assert_eq!(decoder.calls(), vec![0]);

    loop {
        pool.run_until_stalled();
        // Current frame plus at most one batch outstanding
        assert!(decoder.pending_count() <= 1 + 6);
        if decoder.complete_all() == 0 {
            break;
        }
    }

    let calls = decoder.calls();
    assert_eq!(calls[0], 0);
    let mut sorted = calls.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..=60).collect::<Vec<_>>());
    assert_eq!(session.resident_indices(), (0..=60).collect::<Vec<_>>());
    assert!(session.is_ready());
}

#[test]
fn test_prefetch_batches_wait_for_previous_batch() {
    let mut pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(60, 180, 6));
    session.open(source("clip", 100));

    pool.run_until_stalled();
    assert_eq!(decoder.calls(), vec![0, 1, 2, 3, 4, 5, 6]);

    // Finishing only part of the batch does not release the next one
    for index in 1..=5 {
        decoder.complete(index);
    }
    pool.run_until_stalled();
    assert_eq!(decoder.calls().len(), 7);

    decoder.complete(6);
    pool.run_until_stalled();
    assert_eq!(&decoder.calls()[7..], &[7, 8, 9, 10, 11, 12]);
}

/// Pending decodes not requested as the current frame at some point.
fn scheduler_pending(decoder: &ScriptedDecoder, cursors: &[usize]) -> usize {
    decoder
        .pending_indices()
        .into_iter()
        .filter(|index| !cursors.contains(index))
        .count()
}

#[test]
fn test_stepping_keeps_prefetch_within_concurrency() {
    let mut pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(60, 180, 6));
    session.open(source("clip", 1000));
    pool.run_until_stalled();

    for _ in 0..5 {
        session.step(1);
        pool.run_until_stalled();
        assert!(
            decoder.pending_count() <= 1 + 6,
            "pending decodes {}",
            decoder.pending_count()
        );
    }
    // Superseded runs never got to issue anything
    assert_eq!(decoder.calls(), vec![0, 1, 2, 3, 4, 5, 6]);

    // Once the outstanding batch settles, the latest run continues
    decoder.complete_all();
    pool.run_until_stalled();
    let calls = decoder.calls();
    assert_eq!(calls.len(), 7 + 6);
    assert!(calls[7..].iter().all(|index| (2..=65).contains(index)));
    assert!(calls[7..].contains(&7));
}

#[test]
fn test_playback_ticks_keep_prefetch_within_concurrency() {
    let mut pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(60, 180, 6));
    session.open(source("clip", 1000));
    pool.run_until_stalled();

    let start = Instant::now();
    session.play(start);
    let mut cursors = vec![0];
    for tick in 1..=10u64 {
        let cursor = session.tick(start + Duration::from_millis(100 * tick));
        assert_eq!(cursor, Some(tick as usize));
        cursors.push(tick as usize);
        pool.run_until_stalled();
        assert!(scheduler_pending(&decoder, &cursors) <= 6);
    }

    // Only the current frames went out on top of the first batch
    let mut calls = decoder.calls();
    calls.sort_unstable();
    assert_eq!(calls, (0..=10).collect::<Vec<_>>());
}

#[test]
fn test_source_switch_discards_stale_results() {
    let mut pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(0, 10, 6));

    let first = session.open(source("a", 10));
    pool.run_until_stalled();
    assert!(session.is_inflight(0));

    let second = session.open(source("b", 10));
    assert!(second > first);
    assert_eq!(session.stats().resident, 0);
    // Only the new source's request for frame 0 is tracked
    assert_eq!(session.stats().inflight, 1);

    // The decode started for "a" resolves late
    assert!(decoder.complete(0));
    pool.run_until_stalled();
    assert!(!session.is_resident(0));
    assert_eq!(decoder.released(), 1);
    assert!(session.is_inflight(0));

    // The decode for "b" lands normally
    assert!(decoder.complete(0));
    pool.run_until_stalled();
    assert!(session.is_ready());
    assert_eq!(session.take_arrivals(), vec![0]);
}

#[test]
fn test_switch_clears_resident_frames() {
    let mut pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(4, 10, 2));
    session.open(source("a", 20));
    settle_all(&mut pool, &decoder);
    let resident = session.stats().resident;
    assert!(resident > 1);

    session.open(source("b", 20));
    assert_eq!(session.stats().resident, 0);
    assert_eq!(decoder.released(), resident);
    assert!(!session.is_ready());
}

#[test]
fn test_stale_prefetch_run_stops_issuing() {
    let mut pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(60, 180, 6));
    session.open(source("a", 100));
    pool.run_until_stalled();
    assert_eq!(decoder.calls().len(), 7);

    session.open(source("b", 3));
    for index in 0..=6 {
        decoder.complete(index);
    }
    pool.run_until_stalled();

    // The old run saw the new generation and issued nothing past its batch
    assert!(!decoder.calls().contains(&7));
}

#[test]
fn test_cursor_move_supersedes_prefetch_run() {
    let mut pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(60, 180, 6));
    session.open(source("clip", 1000));
    pool.run_until_stalled();

    session.seek(500);
    for index in 1..=6 {
        decoder.complete(index);
    }
    pool.run_until_stalled();

    let calls = decoder.calls();
    assert!(!calls.contains(&7));
    assert!(calls.contains(&500));
    assert!(calls.contains(&501));
}

#[test]
fn test_failed_decode_is_retried_on_next_access() {
    let mut pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(0, 10, 6));
    session.open(source("clip", 5));
    pool.run_until_stalled();

    assert!(decoder.fail(0));
    pool.run_until_stalled();
    assert!(!session.is_ready());
    assert!(!session.is_inflight(0));

    let retry = session.request(0);
    assert_eq!(decoder.calls_for(0), 2);
    decoder.complete(0);
    assert!(pool.run_until(retry).is_some());
    assert!(session.is_ready());
}

#[test]
fn test_cursor_jump_evicts_outside_window() {
    let mut pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(240, 180, 16));
    session.open(source("clip", 1000));

    // Window [0, 360]; everything past 300 is outside the retention window
    session.seek(120);
    settle_all(&mut pool, &decoder);
    assert_eq!(session.resident_indices(), (0..=300).collect::<Vec<_>>());
    let released_before = decoder.released();

    session.seek(300);
    let resident = session.resident_indices();
    assert_eq!(resident, (120..=300).collect::<Vec<_>>());
    assert!(resident.iter().all(|i| (120..=480).contains(i)));
    assert_eq!(decoder.released() - released_before, 120);
    assert!(session.is_ready());

    settle_all(&mut pool, &decoder);
    let stats = session.stats();
    assert!(stats.resident <= stats.capacity);
    assert!(
        session
            .resident_indices()
            .iter()
            .all(|i| (120..=480).contains(i))
    );
}

#[test]
fn test_late_arrival_outside_window_is_dropped() {
    let mut pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(0, 5, 6));
    session.open(source("clip", 100));
    pool.run_until_stalled();

    session.seek(50);
    decoder.complete(0);
    pool.run_until_stalled();

    assert!(!session.is_resident(0));
    assert_eq!(decoder.released(), 1);
    assert!(!session.is_inflight(0));
}

#[test]
fn test_close_tears_everything_down() {
    let mut pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(2, 10, 2));
    session.open(source("clip", 10));
    settle_all(&mut pool, &decoder);

    // One decode still outstanding when the view goes away
    session.seek(9);
    pool.run_until_stalled();
    assert!(decoder.pending_count() > 0);
    session.play(Instant::now());
    assert!(session.playback().timer_armed());

    session.close();
    assert!(!session.is_open());
    assert!(!session.is_ready());
    assert!(!session.playback().timer_armed());
    assert_eq!(session.stats().resident, 0);
    assert_eq!(session.stats().inflight, 0);

    settle_all(&mut pool, &decoder);
    assert_eq!(session.stats().resident, 0);
    assert!(session.take_arrivals().is_empty());
}

#[test]
fn test_playback_tick_requests_next_frame() {
    let mut pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(0, 10, 6));
    session.open(source("clip", 3));
    settle_all(&mut pool, &decoder);

    let start = Instant::now();
    session.play(start);
    assert_eq!(session.tick(start + Duration::from_millis(10)), None);
    assert_eq!(session.tick(start + Duration::from_millis(100)), Some(1));
    assert!(session.is_inflight(1));
    assert!(!session.is_ready());

    settle_all(&mut pool, &decoder);
    assert!(session.is_ready());
    assert_eq!(session.current_bitmap().map(|b| b.index), Some(1));
    assert_eq!(session.bitmap(0).map(|b| b.index), Some(0));
    assert!(session.bitmap(2).is_none());
}

#[test]
fn test_manual_scrub_pauses_playback() {
    let pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(0, 10, 6));
    session.open(source("clip", 10));

    let start = Instant::now();
    session.play(start);
    session.seek(4);
    assert!(!session.playback().is_playing());
    assert_eq!(session.tick(start + Duration::from_secs(1)), None);
    assert_eq!(session.current_frame(), 4);

    assert_eq!(session.step(-5), 9);
    assert_eq!(session.jump_to_start(), 0);
    assert_eq!(session.jump_to_end(), 9);
}

#[test]
fn test_requests_outside_source_resolve_to_none() {
    let mut pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(0, 10, 6));
    session.open(source("clip", 2));
    pool.run_until_stalled();

    assert!(pool.run_until(session.request(7)).is_none());
    assert_eq!(decoder.calls_for(7), 0);

    let stale = session.generation();
    session.open(source("other", 2));
    assert!(pool.run_until(session.request_for(stale, 1)).is_none());
}

#[test]
fn test_dropping_session_discards_pending_results() {
    let mut pool = LocalPool::new();
    let decoder = ScriptedDecoder::default();
    let mut session = session(&pool, &decoder, config(0, 10, 6));
    session.open(source("clip", 2));
    pool.run_until_stalled();
    drop(session);

    decoder.complete(0);
    pool.run_until_stalled();
    assert_eq!(decoder.released(), 1);
}
