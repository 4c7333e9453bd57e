//! Responsive column layout: decide which columns fit, then size them.
//!
//! Visibility walks the columns by ascending priority. Priority-1 columns are
//! always kept; optional columns are kept while their estimated widths fit,
//! and the first one that does not fit drops itself and every lower-ranked
//! optional column. Survivors keep declaration order.
//!
//! Sizing uses the weighted largest-remainder split when any visible column
//! has a weight, otherwise the legacy fixed/even split.

use kubedeck_core::columns::ColumnSpec;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    /// Indices into the declared column list, in declaration order.
    pub visible: Vec<usize>,
    /// Width per visible column, parallel to `visible`.
    pub widths: Vec<u16>,
    pub hidden: usize,
    /// Width left for cells once padding is reserved.
    pub available: u16,
}

/// Lay out `columns` for a terminal `width`.
pub fn compute_layout(columns: &[ColumnSpec], width: u16, padding: u16, default_width: u16) -> Layout {
    let reserved = (columns.len() as u32).saturating_mul(padding as u32);
    let available = (width as u32).saturating_sub(reserved).min(u16::MAX as u32) as u16;
    let visible = visible_columns(columns, available, default_width);
    let chosen: Vec<&ColumnSpec> = visible.iter().map(|&i| &columns[i]).collect();
    let widths = if chosen.iter().any(|c| c.weight > 0) {
        allocate_weighted(&chosen, available)
    } else {
        allocate_legacy(&chosen, available, default_width)
    };
    Layout { hidden: columns.len() - visible.len(), visible, widths, available }
}

fn visible_columns(columns: &[ColumnSpec], available: u16, default_width: u16) -> Vec<usize> {
    let mut order: Vec<usize> = (0..columns.len()).collect();
    order.sort_by_key(|&i| columns[i].priority);

    let mut used: u32 = 0;
    let mut dropping = false;
    let mut keep = vec![false; columns.len()];
    for i in order {
        let c = &columns[i];
        let est = c.estimated_width(default_width) as u32;
        if c.is_required() {
            keep[i] = true;
            used += est;
            continue;
        }
        if dropping || used + est > available as u32 {
            dropping = true;
            continue;
        }
        keep[i] = true;
        used += est;
    }
    (0..columns.len()).filter(|&i| keep[i]).collect()
}

fn base_width(c: &ColumnSpec) -> u16 {
    if c.min_width > 0 { c.min_width } else { c.width }
}

/// Minimum widths first, then the remainder split by weight with the
/// largest-remainder method (ties go to the earlier column).
fn allocate_weighted(cols: &[&ColumnSpec], available: u16) -> Vec<u16> {
    let mut widths: Vec<u16> = cols.iter().map(|c| base_width(c)).collect();
    if cols.is_empty() {
        return widths;
    }
    let mins: u32 = widths.iter().map(|&w| w as u32).sum();
    let remaining = (available as u32).saturating_sub(mins);
    let total_weight: u32 = cols.iter().map(|c| c.weight as u32).sum();

    if total_weight == 0 {
        let n = cols.len() as u32;
        let share = remaining / n;
        let extra = (remaining % n) as usize;
        for (i, w) in widths.iter_mut().enumerate() {
            *w = w.saturating_add((share + u32::from(i < extra)) as u16);
        }
        return widths;
    }

    let mut fractions: Vec<(usize, u32)> = Vec::with_capacity(cols.len());
    let mut handed_out: u32 = 0;
    for (i, c) in cols.iter().enumerate() {
        let scaled = remaining * c.weight as u32;
        let whole = scaled / total_weight;
        handed_out += whole;
        widths[i] = widths[i].saturating_add(whole as u16);
        fractions.push((i, scaled % total_weight));
    }
    // Stable sort keeps list order among equal remainders.
    fractions.sort_by(|a, b| b.1.cmp(&a.1));
    for (i, _) in fractions.into_iter().take((remaining - handed_out) as usize) {
        widths[i] = widths[i].saturating_add(1);
    }
    widths
}

/// Fixed columns keep their width; dynamic columns split the rest evenly,
/// floored at `default_width`. `max_width` only applies to weighted layouts.
fn allocate_legacy(cols: &[&ColumnSpec], available: u16, default_width: u16) -> Vec<u16> {
    let fixed: u32 = cols.iter().filter(|c| c.width > 0).map(|c| c.width as u32).sum();
    let dynamic = cols.iter().filter(|c| c.width == 0).count() as u32;
    let share = if dynamic == 0 { 0 } else { (available as u32).saturating_sub(fixed) / dynamic };
    let share = share.max(default_width as u32).min(u16::MAX as u32) as u16;
    cols.iter()
        .map(|c| if c.width > 0 { c.width } else { share })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("Name", "NAME").min(20).max(50).weight(3),
            ColumnSpec::new("Status", "STATUS").min(10).max(15).weight(1),
            ColumnSpec::new("Node", "NODE").min(30).weight(1).priority(3),
            ColumnSpec::new("IP", "IP").min(16).priority(3),
        ]
    }

    fn titles(cols: &[ColumnSpec], l: &Layout) -> Vec<String> {
        l.visible.iter().map(|&i| cols[i].field.clone()).collect()
    }

    #[test]
    fn scenario_at_eighty_columns() {
        let cols = scenario();
        let l = compute_layout(&cols, 80, 2, 20);
        assert_eq!(l.available, 72);
        assert_eq!(titles(&cols, &l), vec!["Name", "Status", "Node"]);
        assert_eq!(l.hidden, 1);
        assert_eq!(l.widths, vec![27, 13, 32]);
        assert_eq!(l.widths.iter().map(|&w| w as u32).sum::<u32>(), 72);
    }

    #[test]
    fn required_columns_survive_zero_width() {
        let cols = scenario();
        let l = compute_layout(&cols, 0, 2, 20);
        assert_eq!(titles(&cols, &l), vec!["Name", "Status"]);
        assert_eq!(l.available, 0);
        assert_eq!(l.widths, vec![20, 10]);
    }

    #[test]
    fn visibility_is_monotonic_in_width() {
        let cols = vec![
            ColumnSpec::new("A", "A").min(10).priority(2),
            ColumnSpec::new("B", "B").min(40).priority(2),
            ColumnSpec::new("C", "C").min(5).priority(3),
            ColumnSpec::new("D", "D").min(12),
            ColumnSpec::new("E", "E").priority(3),
        ];
        let mut prev: Vec<usize> = Vec::new();
        for w in 0..=200u16 {
            let l = compute_layout(&cols, w, 2, 20);
            assert!(prev.iter().all(|i| l.visible.contains(i)), "width {w} lost a column: {prev:?} -> {:?}", l.visible);
            prev = l.visible;
        }
    }

    #[test]
    fn weighted_widths_sum_exactly() {
        let cols = vec![
            ColumnSpec::new("A", "A").min(7).weight(3),
            ColumnSpec::new("B", "B").min(3).weight(7),
            ColumnSpec::new("C", "C").min(4).weight(11),
            ColumnSpec::new("D", "D").fixed(6),
        ];
        for w in 28..=300u16 {
            let l = compute_layout(&cols, w, 2, 20);
            let sum: u32 = l.widths.iter().map(|&x| x as u32).sum();
            assert_eq!(sum, l.available as u32, "width {w}");
        }
    }

    #[test]
    fn zero_total_weight_splits_evenly() {
        let a = ColumnSpec::new("A", "A").min(5).weight(0);
        let b = ColumnSpec::new("B", "B").min(5);
        let c = ColumnSpec::new("C", "C").min(5);
        let widths = allocate_weighted(&[&a, &b, &c], 20);
        assert_eq!(widths, vec![7, 7, 6]);
    }

    #[test]
    fn legacy_split_is_even_and_floored() {
        let cols = vec![
            ColumnSpec::new("A", "A").fixed(8),
            ColumnSpec::new("B", "B"),
            ColumnSpec::new("C", "C").max(25),
        ];
        // 100 - 6 padding = 94; (94 - 8) / 2 = 43, max ignored
        let l = compute_layout(&cols, 100, 2, 20);
        assert_eq!(l.widths, vec![8, 43, 43]);
        // narrow: share floors at the default width
        let l = compute_layout(&cols, 30, 2, 20);
        assert_eq!(l.widths, vec![8, 20, 20]);
    }

    #[test]
    fn display_order_is_declaration_order() {
        let cols = vec![
            ColumnSpec::new("Opt", "OPT").min(4).priority(2),
            ColumnSpec::new("Req", "REQ").min(4),
        ];
        let l = compute_layout(&cols, 40, 2, 20);
        assert_eq!(titles(&cols, &l), vec!["Opt", "Req"]);
    }
}
