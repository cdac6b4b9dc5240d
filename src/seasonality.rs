use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Sums values per key. Keys come back in ascending order.
pub fn sum_by_key<K, I>(items: I) -> BTreeMap<K, f64>
where
    K: Ord,
    I: IntoIterator<Item = (K, f64)>,
{
    let mut totals = BTreeMap::new();
    for (key, value) in items {
        *totals.entry(key).or_insert(0.0) += value;
    }
    totals
}

/// Revenue per weekday (0 = Monday), with every day present and zero-filled.
pub fn weekday_totals<I>(items: I) -> [f64; 7]
where
    I: IntoIterator<Item = (u32, f64)>,
{
    let mut totals = [0.0; 7];
    for (weekday, revenue) in items {
        if let Some(slot) = totals.get_mut(weekday as usize) {
            *slot += revenue;
        }
    }
    totals
}

/// Revenue per (year, month), chronological.
pub fn monthly_totals<I>(items: I) -> BTreeMap<(i32, u32), f64>
where
    I: IntoIterator<Item = ((i32, u32), f64)>,
{
    sum_by_key(items)
}

/// Revenue per calendar day, chronological.
pub fn daily_totals<I>(items: I) -> BTreeMap<NaiveDate, f64>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    sum_by_key(items)
}

/// Index of the first maximum. `None` for an empty slice.
pub fn first_max_index(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, value) in values.iter().enumerate() {
        match best {
            Some(b) if values[b] >= *value => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Index of the first minimum. `None` for an empty slice.
pub fn first_min_index(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, value) in values.iter().enumerate() {
        match best {
            Some(b) if values[b] <= *value => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Growth of the last month against the first one, in percent.
/// Zero with fewer than two months or a non-positive first month.
pub fn growth_percent(monthly: &BTreeMap<(i32, u32), f64>) -> f64 {
    if monthly.len() < 2 {
        return 0.0;
    }

    let (Some(first), Some(last)) = (monthly.values().next(), monthly.values().next_back())
    else {
        return 0.0;
    };

    if *first > 0.0 {
        (last - first) / first * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekday_totals_zero_filled() {
        let totals = weekday_totals(vec![(0, 100.0), (4, 50.0), (0, 25.0)]);
        assert_eq!(totals, [125.0, 0.0, 0.0, 0.0, 50.0, 0.0, 0.0]);
    }

    #[test]
    fn test_monthly_totals_are_chronological() {
        let totals = monthly_totals(vec![((2024, 2), 10.0), ((2023, 12), 5.0), ((2024, 2), 1.0)]);
        let keys: Vec<(i32, u32)> = totals.keys().copied().collect();
        assert_eq!(keys, vec![(2023, 12), (2024, 2)]);
        assert_eq!(totals[&(2024, 2)], 11.0);
    }

    #[test]
    fn test_first_extremes_prefer_earliest() {
        let values = [3.0, 7.0, 1.0, 7.0, 1.0];
        assert_eq!(first_max_index(&values), Some(1));
        assert_eq!(first_min_index(&values), Some(2));
        assert_eq!(first_max_index(&[0.0; 7]), Some(0));
        assert_eq!(first_max_index(&[]), None);
    }

    #[test]
    fn test_growth_percent() {
        let mut monthly = BTreeMap::new();
        monthly.insert((2024, 1), 1000.0);
        monthly.insert((2024, 2), 1300.0);
        assert!((growth_percent(&monthly) - 30.0).abs() < 1e-9);

        monthly.insert((2024, 3), 500.0);
        assert!((growth_percent(&monthly) + 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_growth_percent_degenerate_cases() {
        let mut monthly = BTreeMap::new();
        assert_eq!(growth_percent(&monthly), 0.0);

        monthly.insert((2024, 1), 1000.0);
        assert_eq!(growth_percent(&monthly), 0.0);

        monthly.insert((2023, 12), 0.0);
        assert_eq!(growth_percent(&monthly), 0.0);
    }
}
