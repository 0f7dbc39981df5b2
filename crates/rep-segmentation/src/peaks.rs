//! Peak Detection with Distance and Prominence Constraints

/// Indices of strict local maxima; a flat top counts once, at its middle.
/// The first and last samples are never maxima.
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }

    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let right_edge = ahead - 1;
                peaks.push((i + right_edge) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    peaks
}

/// Drop peaks closer than `distance` samples to a higher peak.
///
/// Peaks are visited from highest to lowest; each kept peak removes its
/// lower neighbours inside the distance.
pub fn select_by_distance(x: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let n = peaks.len();
    let mut keep = vec![true; n];

    let mut by_height: Vec<usize> = (0..n).collect();
    by_height.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    for &j in by_height.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < n && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}

/// Vertical drop from a peak to the higher of the two lowest points
/// reachable on either side before meeting a taller sample
pub fn prominence(x: &[f64], peak: usize) -> f64 {
    let height = x[peak];

    let mut left_min = height;
    let mut i = peak;
    loop {
        if x[i] > height {
            break;
        }
        left_min = left_min.min(x[i]);
        if i == 0 {
            break;
        }
        i -= 1;
    }

    let mut right_min = height;
    for &v in &x[peak..] {
        if v > height {
            break;
        }
        right_min = right_min.min(v);
    }

    height - left_min.max(right_min)
}

/// Local maxima separated by at least `distance` samples whose prominence
/// reaches `min_prominence`, in ascending index order
pub fn find_peaks(x: &[f64], distance: usize, min_prominence: f64) -> Vec<usize> {
    let candidates = local_maxima(x);
    let spaced = select_by_distance(x, &candidates, distance.max(1));
    spaced
        .into_iter()
        .filter(|&p| prominence(x, p) >= min_prominence)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_maxima_plateau() {
        assert_eq!(local_maxima(&[0.0, 1.0, 1.0, 0.0]), vec![1]);
        assert_eq!(local_maxima(&[0.0, 2.0, 2.0, 2.0, 0.0]), vec![2]);
        // Plateau running into the edge is not a peak
        assert!(local_maxima(&[0.0, 1.0, 1.0]).is_empty());
    }

    #[test]
    fn test_local_maxima_excludes_edges() {
        assert_eq!(local_maxima(&[5.0, 1.0, 3.0, 1.0, 5.0]), vec![2]);
        assert!(local_maxima(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn test_distance_keeps_highest() {
        let x = [0.0, 1.0, 0.0, 3.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.5, 0.0];
        let peaks = local_maxima(&x);
        assert_eq!(peaks, vec![1, 3, 5, 9]);
        assert_eq!(select_by_distance(&x, &peaks, 3), vec![3, 9]);
        assert_eq!(select_by_distance(&x, &peaks, 1), peaks);
    }

    #[test]
    fn test_prominence() {
        let x = [0.0, 3.0, 1.0, 2.0, 0.5, 4.0, 0.0];
        // Right side stops at the taller peak at index 5 after dipping to 0.5
        assert!((prominence(&x, 1) - 2.5).abs() < 1e-12);
        assert!((prominence(&x, 3) - 1.0).abs() < 1e-12);
        assert!((prominence(&x, 5) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_find_peaks_prominence_filter() {
        let x = [0.0, 3.0, 1.0, 2.0, 0.5, 4.0, 0.0];
        assert_eq!(find_peaks(&x, 1, 0.0), vec![1, 3, 5]);
        assert_eq!(find_peaks(&x, 1, 1.5), vec![1, 5]);
    }
}
