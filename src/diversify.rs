// Flight-result diversification: curate a bounded, price-sorted subset of raw
// search results that stays representative across stop counts and departure
// times instead of truncating to the cheapest N.

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use crate::offer::FlightOffer;

pub const DEFAULT_MAX_RESULTS: usize = 15;

// Soft share targets per stop-count bucket
const DIRECT_SHARE: f64 = 0.4;
const ONE_STOP_SHARE: f64 = 0.4;
const TWO_PLUS_SHARE: f64 = 0.2;

// Stop-count classification of an offer's outbound itinerary. Offers without
// any outbound segment match no bucket and are excluded from selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBucket {
    Direct,
    OneStop,
    TwoPlusStop,
}

impl StopBucket {
    pub fn classify(offer: &FlightOffer) -> Option<Self> {
        match offer.outbound_segments().len() {
            0 => None,
            1 => Some(StopBucket::Direct),
            2 => Some(StopBucket::OneStop),
            _ => Some(StopBucket::TwoPlusStop),
        }
    }
}

// Departure-hour classification of the first outbound segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSlot {
    Morning,
    Afternoon,
    Evening,
    Night,
    Fallback,
}

impl TimeSlot {
    pub fn from_departure(raw: Option<&str>) -> Self {
        match raw.and_then(departure_hour) {
            Some(hour) if (6..12).contains(&hour) => TimeSlot::Morning,
            Some(hour) if (12..18).contains(&hour) => TimeSlot::Afternoon,
            Some(hour) if (18..22).contains(&hour) => TimeSlot::Evening,
            Some(_) => TimeSlot::Night,
            None => TimeSlot::Fallback,
        }
    }
}

// The hour is the two digits after the date/time separator. Anything that
// does not parse lands in the fallback slot.
fn departure_hour(raw: &str) -> Option<u32> {
    let (_, time) = raw.split_once('T')?;
    time.get(0..2)?.parse().ok()
}

// Select at most `max_results` offers, sorted ascending by price, with soft
// quotas of 40% direct, 40% one-stop and 20% two-plus-stop itineraries and a
// departure-time spread within each bucket. Unfilled quota slots are
// backfilled from the richest remaining buckets. Input offers are moved, not
// cloned; the result is always a subset of the input.
pub fn diversify(offers: Vec<FlightOffer>, max_results: usize) -> Vec<FlightOffer> {
    if offers.is_empty() || max_results == 0 {
        return Vec::new();
    }

    let mut direct = Vec::new();
    let mut one_stop = Vec::new();
    let mut two_plus = Vec::new();
    for (idx, offer) in offers.iter().enumerate() {
        match StopBucket::classify(offer) {
            Some(StopBucket::Direct) => direct.push(idx),
            Some(StopBucket::OneStop) => one_stop.push(idx),
            Some(StopBucket::TwoPlusStop) => two_plus.push(idx),
            None => {}
        }
    }

    debug!(
        direct = direct.len(),
        one_stop = one_stop.len(),
        two_plus = two_plus.len(),
        "flight distribution before diversification"
    );

    let target_direct = (max_results as f64 * DIRECT_SHARE).ceil() as usize;
    let target_one_stop = (max_results as f64 * ONE_STOP_SHARE).ceil() as usize;
    let target_two_plus = (max_results as f64 * TWO_PLUS_SHARE).floor() as usize;

    let mut selected = [
        diversify_by_time(&offers, &direct, target_direct.min(direct.len())),
        diversify_by_time(&offers, &one_stop, target_one_stop.min(one_stop.len())),
        diversify_by_time(&offers, &two_plus, target_two_plus.min(two_plus.len())),
    ];

    let picked_total: usize = selected.iter().map(Vec::len).sum();
    let mut shortfall = max_results.saturating_sub(picked_total);

    if shortfall > 0 {
        let buckets = [&direct, &one_stop, &two_plus];
        let mut remaining: Vec<(usize, Vec<usize>)> = buckets
            .iter()
            .enumerate()
            .map(|(slot, bucket)| {
                let taken: HashSet<usize> = selected[slot].iter().copied().collect();
                let rest = bucket
                    .iter()
                    .copied()
                    .filter(|idx| !taken.contains(idx))
                    .collect();
                (slot, rest)
            })
            .collect();

        // richest bucket first; the sort is stable, so ties keep the
        // direct / one-stop / two-plus order
        remaining.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        for (slot, rest) in remaining {
            if shortfall == 0 {
                break;
            }
            let take = shortfall.min(rest.len());
            if take == 0 {
                continue;
            }
            let extra = diversify_by_time(&offers, &rest, take);
            shortfall -= extra.len();
            selected[slot].extend(extra);
        }
    }

    let mut picked: Vec<usize> = selected.into_iter().flatten().collect();
    picked.sort_by(|&a, &b| {
        offers[a]
            .comparable_price()
            .total_cmp(&offers[b].comparable_price())
    });
    picked.truncate(max_results);

    // move the chosen offers out of the input without cloning
    let mut slots: Vec<Option<FlightOffer>> = offers.into_iter().map(Some).collect();
    picked
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect()
}

// Pick up to `count` candidates spread across the four real time slots,
// round-robin in morning -> afternoon -> evening -> night order, FIFO within
// a slot. The fallback queue (offers with no parseable departure) is drained
// only once every real slot is empty.
fn diversify_by_time(offers: &[FlightOffer], candidates: &[usize], count: usize) -> Vec<usize> {
    if candidates.is_empty() || count == 0 {
        return Vec::new();
    }

    let mut slots: [VecDeque<usize>; 4] = Default::default();
    let mut fallback: VecDeque<usize> = VecDeque::new();
    for &idx in candidates {
        match TimeSlot::from_departure(offers[idx].first_departure()) {
            TimeSlot::Morning => slots[0].push_back(idx),
            TimeSlot::Afternoon => slots[1].push_back(idx),
            TimeSlot::Evening => slots[2].push_back(idx),
            TimeSlot::Night => slots[3].push_back(idx),
            TimeSlot::Fallback => fallback.push_back(idx),
        }
    }

    let mut picked = Vec::with_capacity(count.min(candidates.len()));
    let mut turn = 0usize;
    while picked.len() < count {
        if slots.iter().all(|queue| queue.is_empty()) {
            while picked.len() < count {
                match fallback.pop_front() {
                    Some(idx) => picked.push(idx),
                    None => break,
                }
            }
            break;
        }
        if let Some(idx) = slots[turn % slots.len()].pop_front() {
            picked.push(idx);
        }
        turn += 1;
    }
    picked
}
