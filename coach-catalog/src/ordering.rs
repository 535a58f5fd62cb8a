//! Deterministic seat ordering and hold planning.

use coach_core::SeatNumber;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Natural order for seat numbers: numeric numbers compare by value
/// (`"2" < "10"`), everything else sorts after them, lexicographically.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

pub fn sort_seat_numbers(seats: &mut [SeatNumber]) {
    seats.sort_by(|a, b| natural_cmp(a, b));
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum HoldPlanError {
    #[error("Seat {0} not available")]
    Unavailable(SeatNumber),
}

/// Decides which seats a hold request should lock.
///
/// `available` must already exclude booked seats and seats held by other
/// tokens. Explicit seats keep request order (duplicates collapse to the
/// first occurrence) and must all be available; then up to `auto_assign`
/// further seats are taken from `available` in natural order.
pub fn plan_hold(
    available: &[SeatNumber],
    explicit: &[SeatNumber],
    auto_assign: usize,
) -> Result<Vec<SeatNumber>, HoldPlanError> {
    let open: HashSet<&str> = available.iter().map(String::as_str).collect();

    let mut chosen: Vec<SeatNumber> = Vec::with_capacity(explicit.len());
    let mut seen: HashSet<&str> = HashSet::new();

    for seat in explicit {
        if !seen.insert(seat.as_str()) {
            continue;
        }
        if !open.contains(seat.as_str()) {
            return Err(HoldPlanError::Unavailable(seat.clone()));
        }
        chosen.push(seat.clone());
    }

    if auto_assign > 0 {
        let mut remaining: Vec<&SeatNumber> = available
            .iter()
            .filter(|seat| !seen.contains(seat.as_str()))
            .collect();
        remaining.sort_by(|a, b| natural_cmp(a, b));
        remaining.truncate(auto_assign);
        chosen.extend(remaining.into_iter().cloned());
    }

    Ok(chosen)
}
