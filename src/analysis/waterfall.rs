//! Serial-dependency chain ("waterfall") detection
//!
//! Events of one kind are sorted by start and walked once. An event extends
//! the current chain when it starts at or after the previous member's
//! finish. An overlapping event closes the chain: a chain of three or more
//! is reported, anything shorter is thrown away whole, and a new chain
//! starts at the overlapping event.

use crate::types::{EventKind, Session, Waterfall, WaterfallMember};

/// Minimum chain length worth reporting
pub const MIN_WATERFALL_LEN: usize = 3;

/// Waterfalls among network calls, then among async renders
pub fn detect_waterfalls(session: &Session) -> Vec<Waterfall> {
    let fetches = session
        .fetches
        .iter()
        .map(|e| WaterfallMember {
            id: e.id.clone(),
            label: e.url.clone(),
            start: e.timing.start(),
            finish: e.timing.finish(),
        })
        .collect();

    let renders = session
        .renders
        .iter()
        .filter(|e| e.is_async)
        .map(|e| WaterfallMember {
            id: e.id.clone(),
            label: e.component.clone(),
            start: e.timing.start(),
            finish: e.timing.finish(),
        })
        .collect();

    let mut waterfalls = detect_chains(EventKind::Network, fetches);
    waterfalls.extend(detect_chains(EventKind::Render, renders));
    waterfalls
}

/// Run the chain walk over one kind's members
pub fn detect_chains(kind: EventKind, mut members: Vec<WaterfallMember>) -> Vec<Waterfall> {
    members.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut waterfalls = Vec::new();
    let mut chain: Vec<WaterfallMember> = Vec::new();

    for member in members {
        let serial = chain.last().map_or(true, |prev| member.start >= prev.finish);
        if !serial {
            close_chain(kind, std::mem::take(&mut chain), &mut waterfalls);
        }
        chain.push(member);
    }
    close_chain(kind, chain, &mut waterfalls);

    waterfalls
}

fn close_chain(kind: EventKind, chain: Vec<WaterfallMember>, out: &mut Vec<Waterfall>) {
    if chain.len() < MIN_WATERFALL_LEN {
        return;
    }
    let start = chain[0].start;
    let end = chain[chain.len() - 1].finish;
    out.push(Waterfall {
        kind,
        members: chain,
        start,
        end,
        total_duration: end - start,
    });
}
