//! Peak picking over a magnitude spectrum.
//!
//! Local maxima come from `find_peaks`. A flat top counts once, at its
//! middle. Peaks below the height floor are dropped, and so are peaks
//! closer than the minimum distance to a taller one, so the leakage
//! shoulders around a strong partial do not pass as separate partials.

use std::cmp::Ordering;

use find_peaks::PeakFinder;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Position in the analysed slice.
    pub index: usize,
    pub magnitude: f32,
}

/// Finds peaks at least `min_height` tall and at least `min_distance`
/// positions apart, returned in position order.
pub fn find_peaks(data: &[f32], min_height: f32, min_distance: usize) -> Vec<Peak> {
    let mut peaks: Vec<Peak> = PeakFinder::new(data)
        .with_min_height(min_height)
        .with_min_distance(min_distance)
        .find_peaks()
        .iter()
        .map(|peak| {
            let index = peak.middle_position();
            Peak {
                index,
                magnitude: data[index],
            }
        })
        .collect();
    peaks.sort_unstable_by_key(|peak| peak.index);
    peaks
}

/// Orders peaks tallest first. Equal heights keep the later peak first.
fn by_magnitude_desc(a: &Peak, b: &Peak) -> Ordering {
    b.magnitude
        .total_cmp(&a.magnitude)
        .then_with(|| b.index.cmp(&a.index))
}

/// Sorts peaks in place, tallest first.
pub fn sort_by_magnitude(peaks: &mut [Peak]) {
    peaks.sort_by(by_magnitude_desc);
}
