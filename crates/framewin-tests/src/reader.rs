//! Working-zone scenarios driven through `VideoReader` with a scripted backend.

use crate::support::{open, open_gated, poll_until, resident, script, zone, DURATION};
use framewin_core::{FrameBuffer, FrameSlot, FrameWinError, PixelFormat, TimeSection};
use framewin_media::{
    CacheBudget, ImageAspectRatio, ImportOutcome, InlineScheduler, ReaderFlags, ThreadScheduler,
    VideoReader, ZoneDecision,
};

// ── Helpers ────────────────────────────────────────────────────

fn update(reader: &mut VideoReader, start: i64, end: i64) -> ZoneDecision {
    reader
        .update_working_zone(zone(start, end), false, CacheBudget::default(), &InlineScheduler)
        .unwrap()
}

fn cached(start: i64, end: i64) -> Vec<i64> {
    (start..end).collect()
}

// ── Opening ────────────────────────────────────────────────────

#[test]
fn open_starts_frame_by_frame_on_whole_stream() {
    let script = script();
    let reader = open(&script);
    assert_eq!(reader.working_zone(), zone(0, DURATION));
    assert!(!reader.is_caching());
    assert!(!reader.is_importing());
    assert!(reader.current().is_none());
    assert_eq!(reader.read_metadata().as_deref(), Some("scripted"));
}

#[test]
fn close_releases_backend_and_cache() {
    let script = script();
    let mut reader = open(&script);
    update(&mut reader, 0, 100);
    reader.close();
    assert!(script.lock().closed);
    assert!(reader.cache().is_empty());
    assert_eq!(reader.working_zone(), TimeSection::Empty);
}

// ── Working-zone reconciliation ────────────────────────────────

#[test]
fn first_zone_is_fully_imported() {
    let script = script();
    let mut reader = open(&script);
    assert_eq!(update(&mut reader, 0, 100), ZoneDecision::FullReload);
    assert!(reader.is_caching());
    assert_eq!(resident(&reader), cached(0, 100));
    assert_eq!(script.lock().imports, vec![zone(0, 100)]);
    assert_eq!(
        reader.last_import_outcome(),
        Some(&ImportOutcome::Completed)
    );
}

#[test]
fn shrinking_purges_without_decoding() {
    let script = script();
    let mut reader = open(&script);
    update(&mut reader, 0, 100);
    assert_eq!(update(&mut reader, 20, 80), ZoneDecision::Reduce);
    assert!(reader.is_caching());
    assert_eq!(resident(&reader), cached(20, 80));
    assert_eq!(script.lock().imports.len(), 1);
}

#[test]
fn shrinking_with_tighter_budget_keeps_new_zone_head() {
    let script = script();
    let mut reader = open(&script);
    update(&mut reader, 0, 100);

    // 60 frames at 25 fps only fit once the old head is purged.
    let budget = CacheBudget::new(2.5, usize::MAX);
    let decision = reader
        .update_working_zone(zone(20, 80), false, budget, &InlineScheduler)
        .unwrap();
    assert_eq!(decision, ZoneDecision::Reduce);
    assert!(reader.is_caching());
    assert_eq!(resident(&reader), cached(20, 80));
    assert_eq!(reader.cache().evictions(), 0);

    assert!(reader.move_first().unwrap());
    assert_eq!(reader.current().map(|s| s.timestamp), Some(20));
}

#[test]
fn shrinking_past_budget_stops_caching() {
    let script = script();
    let mut reader = open(&script);
    update(&mut reader, 0, 100);

    script.lock().fits = Some(true);
    let budget = CacheBudget::new(1.0, usize::MAX);
    reader
        .update_working_zone(zone(20, 80), false, budget, &InlineScheduler)
        .unwrap();
    assert!(!reader.is_caching());
    assert!(reader.cache().len() <= 25);
}

#[test]
fn growing_on_both_sides_reloads() {
    let script = script();
    let mut reader = open(&script);
    update(&mut reader, 0, 100);
    update(&mut reader, 20, 80);
    assert_eq!(update(&mut reader, 0, 100), ZoneDecision::ReloadBothSides);
    assert_eq!(resident(&reader), cached(0, 100));
    assert_eq!(script.lock().imports, vec![zone(0, 100), zone(0, 100)]);
}

#[test]
fn growing_at_head_imports_only_the_gap() {
    let script = script();
    let mut reader = open(&script);
    update(&mut reader, 0, 100);
    update(&mut reader, 20, 80);
    assert_eq!(
        update(&mut reader, 10, 80),
        ZoneDecision::Prepend(zone(10, 20))
    );
    assert!(reader.is_caching());
    assert_eq!(resident(&reader), cached(10, 80));
    assert_eq!(script.lock().imports.last(), Some(&zone(10, 20)));
}

#[test]
fn growing_at_tail_imports_only_the_gap() {
    let script = script();
    let mut reader = open(&script);
    update(&mut reader, 0, 100);
    update(&mut reader, 20, 80);
    assert_eq!(
        update(&mut reader, 20, 90),
        ZoneDecision::Append(zone(80, 90))
    );
    assert_eq!(resident(&reader), cached(20, 90));
}

#[test]
fn shifting_forward_purges_head_and_appends_tail() {
    let script = script();
    let mut reader = open(&script);
    update(&mut reader, 20, 80);
    assert_eq!(
        update(&mut reader, 30, 90),
        ZoneDecision::Append(zone(80, 90))
    );
    assert_eq!(resident(&reader), cached(30, 90));
}

#[test]
fn prepend_keeps_current_frame() {
    let script = script();
    let mut reader = open(&script);
    update(&mut reader, 20, 80);
    assert!(reader.move_to(50).unwrap());
    update(&mut reader, 10, 80);
    assert_eq!(reader.current().map(|s| s.timestamp), Some(50));
    assert!(reader.move_next(false).unwrap());
    assert_eq!(reader.current().map(|s| s.timestamp), Some(51));
}

#[test]
fn repeating_an_update_decodes_nothing() {
    let script = script();
    let mut reader = open(&script);
    update(&mut reader, 0, 100);
    let before = resident(&reader);
    update(&mut reader, 0, 100);
    assert_eq!(resident(&reader), before);
    assert_eq!(script.lock().imports.len(), 1);
}

#[test]
fn disjoint_zone_reloads() {
    let script = script();
    let mut reader = open(&script);
    update(&mut reader, 0, 100);
    assert_eq!(update(&mut reader, 200, 250), ZoneDecision::FullReload);
    assert_eq!(resident(&reader), cached(200, 250));
}

#[test]
fn zone_over_budget_goes_frame_by_frame() {
    let script = script();
    let mut reader = open(&script);
    update(&mut reader, 0, 100);

    // The whole stream is 40 seconds, over the 30 second default.
    assert_eq!(update(&mut reader, 0, DURATION), ZoneDecision::StopCaching);
    assert!(!reader.is_caching());
    assert!(reader.cache().is_empty());

    assert!(reader.move_to(500).unwrap());
    assert_eq!(resident(&reader), vec![500]);
    assert!(reader.move_next(true).unwrap());
    assert_eq!(resident(&reader), vec![501]);
    assert_eq!(script.lock().imports.len(), 1);
}

#[test]
fn backend_budget_answer_is_authoritative() {
    let script = script();
    script.lock().fits = Some(false);
    let mut reader = open(&script);
    assert_eq!(update(&mut reader, 0, 10), ZoneDecision::StopCaching);
    assert!(script.lock().imports.is_empty());
}

#[test]
fn forced_reload_of_cached_zone() {
    let script = script();
    let mut reader = open(&script);
    update(&mut reader, 0, 100);
    let decision = reader
        .update_working_zone(zone(0, 100), true, CacheBudget::default(), &InlineScheduler)
        .unwrap();
    assert_eq!(decision, ZoneDecision::FullReload);
    assert_eq!(script.lock().imports.len(), 2);
    assert_eq!(resident(&reader), cached(0, 100));
}

#[test]
fn import_overflowing_budget_stays_frame_by_frame() {
    let script = script();
    script.lock().fits = Some(true);
    let mut reader = open(&script);
    let slot_bytes = FrameSlot::new(0, 0, FrameBuffer::new(4, 4, PixelFormat::Gray8)).memory_size();

    reader
        .update_working_zone(
            zone(0, 100),
            false,
            CacheBudget::new(100.0, 10 * slot_bytes),
            &InlineScheduler,
        )
        .unwrap();
    assert!(!reader.is_caching());
    assert_eq!(resident(&reader), cached(90, 100));
    assert_eq!(reader.cache().evictions(), 90);
}

#[test]
fn always_caching_backend_ignores_zone_updates() {
    let script = script();
    script.lock().flags = ReaderFlags {
        always_caching: true,
        ..ReaderFlags::default()
    };
    let mut reader = open(&script);
    assert!(reader.is_caching());
    assert_eq!(reader.cache().len(), DURATION as usize);
    assert_eq!(reader.current().map(|s| s.timestamp), Some(0));

    assert_eq!(update(&mut reader, 0, 10), ZoneDecision::AlwaysCached);
    assert_eq!(reader.working_zone(), zone(0, DURATION));
    assert_eq!(reader.cache().len(), DURATION as usize);
    assert_eq!(script.lock().imports.len(), 1);
}

// ── Import failures and cancellation ───────────────────────────

#[test]
fn cancelling_keeps_frames_already_added() {
    let script = script();
    let (mut reader, gate) = open_gated(&script);
    reader
        .update_working_zone(zone(0, 100), false, CacheBudget::default(), &ThreadScheduler)
        .unwrap();
    assert!(reader.is_importing());

    for _ in 0..5 {
        gate.send(()).unwrap();
    }
    poll_until(&mut reader, |r| r.cache().len() == 5);

    reader.cancel_import();
    drop(gate);
    assert!(!reader.is_caching());
    assert!(!reader.is_importing());
    assert_eq!(resident(&reader), cached(0, 5));
    assert_eq!(reader.last_import_outcome(), Some(&ImportOutcome::Cancelled));

    reader.poll_import().unwrap();
    assert_eq!(resident(&reader), cached(0, 5));
}

#[test]
fn repeated_update_while_importing_keeps_the_import() {
    let script = script();
    let (mut reader, gate) = open_gated(&script);
    let budget = CacheBudget::default();
    reader
        .update_working_zone(zone(0, 100), false, budget, &ThreadScheduler)
        .unwrap();

    let again = reader
        .update_working_zone(zone(0, 100), false, budget, &ThreadScheduler)
        .unwrap();
    assert_eq!(again, ZoneDecision::AlreadyImporting);
    assert!(reader.is_importing());

    let forced = reader
        .update_working_zone(zone(0, 100), true, budget, &ThreadScheduler)
        .unwrap();
    assert_eq!(forced, ZoneDecision::FullReload);

    drop(gate);
    assert_eq!(
        reader.wait_for_import().unwrap(),
        Some(ImportOutcome::Completed)
    );
    assert!(reader.is_caching());
    assert_eq!(resident(&reader), cached(0, 100));
}

#[test]
fn out_of_order_frame_is_surfaced() {
    let script = script();
    script.lock().duplicate_at = Some(10);
    let mut reader = open(&script);

    let err = reader
        .update_working_zone(zone(0, 100), false, CacheBudget::default(), &InlineScheduler)
        .unwrap_err();
    assert!(matches!(
        err,
        FrameWinError::OutOfOrder {
            timestamp: 10,
            bound: 10,
            prepend: false
        }
    ));
    assert!(err.is_contract_violation());
    assert!(!reader.is_caching());
    assert!(!reader.is_importing());
    assert_eq!(resident(&reader), cached(0, 11));
}

#[test]
fn failed_import_falls_back_to_frame_by_frame() {
    let script = script();
    script.lock().fail_at = Some(50);
    let mut reader = open(&script);

    assert_eq!(update(&mut reader, 0, 100), ZoneDecision::FullReload);
    assert!(matches!(
        reader.last_import_outcome(),
        Some(ImportOutcome::Failed(_))
    ));
    assert!(!reader.is_caching());
    assert_eq!(resident(&reader), cached(0, 50));

    assert!(reader.move_to(75).unwrap());
    assert_eq!(resident(&reader), vec![75]);
}

// ── Navigation ─────────────────────────────────────────────────

#[test]
fn cached_navigation_is_clamped_to_the_zone() {
    let script = script();
    let mut reader = open(&script);
    update(&mut reader, 20, 80);
    let seeks = script.lock().seeks.len();

    assert!(reader.move_to(500).unwrap());
    assert_eq!(reader.current().map(|s| s.timestamp), Some(79));
    assert!(!reader.move_next(false).unwrap());

    assert!(reader.move_to(-5).unwrap());
    assert_eq!(reader.current().map(|s| s.timestamp), Some(20));

    assert!(reader.move_last().unwrap());
    assert_eq!(reader.current().map(|s| s.timestamp), Some(79));
    assert!(reader.move_first().unwrap());
    assert_eq!(reader.current().map(|s| s.timestamp), Some(20));

    assert_eq!(script.lock().seeks.len(), seeks);
}

#[test]
fn move_by_steps_and_seeks() {
    let script = script();
    let mut reader = open(&script);
    update(&mut reader, 0, 100);
    reader.move_first().unwrap();

    assert!(reader.move_by(5).unwrap());
    assert_eq!(reader.current().map(|s| s.timestamp), Some(5));
    assert!(reader.move_by(-2).unwrap());
    assert_eq!(reader.current().map(|s| s.timestamp), Some(3));
    assert!(reader.move_by(1).unwrap());
    assert_eq!(reader.current().map(|s| s.timestamp), Some(4));
    assert!(reader.move_prev().unwrap());
    assert_eq!(reader.current().map(|s| s.timestamp), Some(3));
}

#[test]
fn move_by_before_stream_start_seeks_to_zero() {
    let script = script();
    let mut reader = open(&script);
    reader
        .update_working_zone(zone(0, 100), false, CacheBudget::NONE, &InlineScheduler)
        .unwrap();
    assert!(reader.move_to(3).unwrap());

    assert!(reader.move_by(-10).unwrap());
    assert_eq!(script.lock().seeks.last(), Some(&0));
    assert_eq!(reader.current().map(|s| s.timestamp), Some(0));
}

#[test]
fn first_step_after_import_starts_at_zone_head() {
    let script = script();
    let mut reader = open(&script);
    update(&mut reader, 30, 60);
    assert!(reader.current().is_none());
    assert!(reader.move_next(false).unwrap());
    assert_eq!(reader.current().map(|s| s.timestamp), Some(30));
}

#[test]
fn frame_by_frame_stops_at_zone_end() {
    let script = script();
    let mut reader = open(&script);
    reader
        .update_working_zone(zone(0, 100), false, CacheBudget::NONE, &InlineScheduler)
        .unwrap();
    assert!(reader.move_to(98).unwrap());
    assert!(reader.move_next(true).unwrap());
    assert_eq!(reader.current().map(|s| s.timestamp), Some(99));
    assert!(!reader.move_next(true).unwrap());
    assert_eq!(reader.current().map(|s| s.timestamp), Some(99));
}

#[test]
fn late_asynchronous_frame_is_dropped() {
    let script = script();
    script.lock().never_ready = true;
    let mut reader = open(&script);
    reader
        .update_working_zone(zone(0, 100), false, CacheBudget::NONE, &InlineScheduler)
        .unwrap();
    reader.move_to(10).unwrap();

    assert!(!reader.move_next(false).unwrap());
    assert_eq!(reader.current().map(|s| s.timestamp), Some(10));
    assert_eq!(reader.dropped_frames(), 1);

    assert!(reader.move_next(true).unwrap());
    assert_eq!(reader.current().map(|s| s.timestamp), Some(11));

    reader.reset_drops();
    assert_eq!(reader.dropped_frames(), 0);
}

#[test]
fn asynchronous_step_during_import_is_dropped() {
    let script = script();
    let (mut reader, gate) = open_gated(&script);
    reader
        .update_working_zone(zone(0, 100), false, CacheBudget::default(), &ThreadScheduler)
        .unwrap();

    assert!(!reader.move_next(false).unwrap());
    assert_eq!(reader.dropped_frames(), 1);
    assert!(reader.current().is_none());

    drop(gate);
    reader.wait_for_import().unwrap();
    assert!(reader.is_caching());
    assert!(reader.move_next(false).unwrap());
    assert_eq!(reader.current().map(|s| s.timestamp), Some(0));
}

#[test]
fn import_progress_counts_applied_frames() {
    let script = script();
    let (mut reader, gate) = open_gated(&script);
    reader
        .update_working_zone(zone(0, 100), false, CacheBudget::default(), &ThreadScheduler)
        .unwrap();
    assert_eq!(reader.import_progress().map(|p| p.total), Some(101));

    for _ in 0..3 {
        gate.send(()).unwrap();
    }
    poll_until(&mut reader, |r| r.cache().len() == 3);
    assert_eq!(reader.import_progress().map(|p| p.read), Some(3));

    drop(gate);
    reader.wait_for_import().unwrap();
    assert_eq!(reader.import_progress(), None);
}

// ── Decoding options ───────────────────────────────────────────

#[test]
fn changing_aspect_ratio_invalidates_cache() {
    let script = script();
    script.lock().flags = ReaderFlags {
        can_change_aspect_ratio: true,
        ..ReaderFlags::default()
    };
    let mut reader = open(&script);
    update(&mut reader, 0, 100);
    reader.move_to(10).unwrap();

    assert!(reader.change_aspect_ratio(ImageAspectRatio::Force169).unwrap());
    assert!(!reader.is_caching());
    assert_eq!(resident(&reader), vec![10]);
    assert_eq!(reader.options().aspect_ratio, ImageAspectRatio::Force169);
    assert_eq!(script.lock().options.len(), 1);

    assert!(!reader.change_aspect_ratio(ImageAspectRatio::Force169).unwrap());
    assert_eq!(script.lock().options.len(), 1);
}

#[test]
fn unsupported_option_change_is_refused() {
    let script = script();
    let mut reader = open(&script);
    update(&mut reader, 0, 100);

    assert!(!reader.change_deinterlace(true).unwrap());
    assert!(!reader.change_aspect_ratio(ImageAspectRatio::Force43).unwrap());
    assert!(reader.is_caching());
    assert_eq!(reader.cache().len(), 100);
    assert!(script.lock().options.is_empty());
}

#[test]
fn changing_deinterlace_cancels_import() {
    let script = script();
    script.lock().flags = ReaderFlags {
        can_change_deinterlace: true,
        ..ReaderFlags::default()
    };
    let (mut reader, gate) = open_gated(&script);
    reader
        .update_working_zone(zone(0, 100), false, CacheBudget::default(), &ThreadScheduler)
        .unwrap();
    gate.send(()).unwrap();
    drop(gate);

    assert!(reader.change_deinterlace(true).unwrap());
    assert!(!reader.is_importing());
    assert!(!reader.is_caching());
    assert!(reader.cache().is_empty());
    assert!(reader.options().deinterlace);
}
