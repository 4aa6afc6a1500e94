//! The background segment loader.
//!
//! One loader thread per [`Source`](super::Source). The loader keeps the
//! active segment loaded and pre-loads upcoming segments into recycled pool
//! slots, evicting the least recently used slot. It never evicts the
//! segment the parser has locked; if the only candidate slot holds the
//! locked segment the loader backs off and waits for the parser to move on.
//! Failures are published through `loader_msg` and wake the parser, which
//! surfaces them as a fatal error.

use std::io::{Read, Seek, SeekFrom};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::{debug, trace};

use super::Shared;

enum LoadOutcome {
    Loaded,
    Blocked,
    Failed,
}

pub(super) fn loader_thread(shared: Arc<Shared>) {
    let mut my_active_seg: Option<usize> = None;

    let load_segment = |seg_idx: usize, my_active: &mut Option<usize>| -> LoadOutcome {
        let pool_id = {
            let mut state = shared.state.lock().unwrap();
            *my_active = Some(state.active_seg);
            if state.locked_seg == Some(seg_idx) {
                return LoadOutcome::Blocked;
            }
            let Some(pool_id) = state.lru_get() else {
                return LoadOutcome::Blocked;
            };
            let victim = state.id2seg[&pool_id];
            if state.locked_seg == Some(victim) {
                return LoadOutcome::Blocked;
            }
            state.seg_state[victim].loaded = false;
            state.seg_state[victim].buf = None;
            state.id2seg.insert(pool_id, seg_idx);
            state.lru_use(pool_id);
            pool_id
        };

        let info = &shared.infos[seg_idx];
        let fail = |msg: String| {
            let mut state = shared.state.lock().unwrap();
            state.loader_msg = Some(msg);
            shared.cond.notify_all();
            LoadOutcome::Failed
        };

        let mut file = match std::fs::File::open(&info.name) {
            Ok(f) => f,
            Err(_) => return fail(format!("failed to open file '{}'", info.name)),
        };
        if file.seek(SeekFrom::Start(info.byte_ofs)).is_err() {
            return fail(format!("seek failed in '{}'", info.name));
        }
        let want = info.byte_cnt - usize::from(info.synthetic_lf);
        let mut buf = vec![0u8; want];
        if file.read_exact(&mut buf).is_err() {
            return fail(format!("error while reading '{}'", info.name));
        }
        if info.synthetic_lf {
            buf.push(b'\n');
        }

        {
            let mut state = shared.state.lock().unwrap();
            state.seg_state[seg_idx].pool_id = pool_id;
            state.seg_state[seg_idx].loaded = true;
            state.seg_state[seg_idx].buf = Some(Arc::new(buf));
            *my_active = Some(state.active_seg);
        }
        shared.cond.notify_all();
        trace!("loaded segment {seg_idx} into slot {pool_id}");
        LoadOutcome::Loaded
    };

    debug!("segment loader started, {} segments", shared.infos.len());

    while !shared.stop.load(Ordering::SeqCst) {
        // Make sure the active segment is loaded.
        loop {
            let Some(active) = my_active_seg else { break };
            let loaded = {
                let state = shared.state.lock().unwrap();
                if state.loader_msg.is_some() {
                    return;
                }
                state.seg_state[active].loaded
            };
            if loaded {
                break;
            }
            if shared.stop.load(Ordering::SeqCst) {
                return;
            }
            match load_segment(active, &mut my_active_seg) {
                LoadOutcome::Loaded => {}
                LoadOutcome::Blocked => break,
                LoadOutcome::Failed => return,
            }
        }

        // Pre-load upcoming segments.
        'preload: loop {
            let Some(active) = my_active_seg else { break };
            let active_loaded = {
                let state = shared.state.lock().unwrap();
                state.seg_state[active].loaded
            };
            if !active_loaded {
                break;
            }
            if shared.stop.load(Ordering::SeqCst) {
                return;
            }
            let mut seg_idx = active;
            let next = loop {
                if shared.stop.load(Ordering::SeqCst) {
                    return;
                }
                seg_idx = (seg_idx + 1) % shared.infos.len();
                if seg_idx == active {
                    break None;
                }
                // Pinned segments are always resident.
                let state = shared.state.lock().unwrap();
                if state.seg_state[seg_idx].pool_id < 0 {
                    continue;
                }
                if !state.seg_state[seg_idx].loaded {
                    break Some(seg_idx);
                }
            };
            match next {
                None => break,
                Some(seg_idx) => match load_segment(seg_idx, &mut my_active_seg) {
                    LoadOutcome::Loaded => {}
                    LoadOutcome::Blocked => break 'preload,
                    LoadOutcome::Failed => return,
                },
            }
        }

        // Wait for more work.
        {
            let mut state = shared.state.lock().unwrap();
            if let Some(active) = my_active_seg {
                while !shared.stop.load(Ordering::SeqCst)
                    && state.active_seg == active
                    && state.seg_state[active].loaded
                {
                    state = shared.cond.wait(state).unwrap();
                }
            } else if !shared.stop.load(Ordering::SeqCst) {
                state = shared.cond.wait(state).unwrap();
            }
            my_active_seg = Some(state.active_seg);
        }
    }
}
