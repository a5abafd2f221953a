//! Line-based three-way merge
//!
//! A diff3-style merge: both sides are diffed against the baseline
//! independently (Myers shortest edit script, i.e. an LCS alignment), the
//! resulting hunks are laid out on baseline coordinates, and hunks from the
//! two sides that overlap or touch form a conflict region. Regions changed by
//! only one side are applied as-is; regions changed identically by both sides
//! are applied once.
//!
//! Aligning on content rather than line numbers means an edit near the top
//! of the file does not shift or break a generator change further down.

use similar::{capture_diff_slices, Algorithm, DiffTag};

use super::{ConflictStyle, MergeOutcome, BASELINE_LABEL, CURRENT_LABEL, GENERATED_LABEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Side {
    Current,
    Generated,
}

/// A replaced baseline range `[start, end)` on one side.
#[derive(Debug)]
struct Hunk<'a> {
    start: usize,
    end: usize,
    lines: Vec<&'a str>,
    side: Side,
}

fn split_lines(content: &str) -> Vec<&str> {
    content.split_inclusive('\n').collect()
}

fn hunks<'a>(base: &[&'a str], other: &[&'a str], side: Side) -> Vec<Hunk<'a>> {
    let mut hunks: Vec<Hunk<'a>> = Vec::new();
    for op in capture_diff_slices(Algorithm::Myers, base, other) {
        let (tag, old, new) = op.as_tag_tuple();
        if tag == DiffTag::Equal {
            continue;
        }
        // Adjacent delete/insert ops describe one replacement.
        if let Some(last) = hunks.last_mut() {
            if last.end == old.start {
                last.end = old.end;
                last.lines.extend_from_slice(&other[new]);
                continue;
            }
        }
        hunks.push(Hunk {
            start: old.start,
            end: old.end,
            lines: other[new].to_vec(),
            side,
        });
    }
    hunks
}

/// One side's version of the baseline range `[start, end)`.
fn side_version<'a>(
    base: &[&'a str],
    group: &[Hunk<'a>],
    side: Side,
    start: usize,
    end: usize,
) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut pos = start;
    for hunk in group.iter().filter(|h| h.side == side) {
        out.extend_from_slice(&base[pos..hunk.start]);
        out.extend_from_slice(&hunk.lines);
        pos = hunk.end;
    }
    out.extend_from_slice(&base[pos..end]);
    out
}

fn push_section(out: &mut String, lines: &[&str]) {
    for line in lines {
        out.push_str(line);
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
}

fn describe_region(start: usize, end: usize) -> String {
    if start == end {
        format!("insertion after baseline line {}", start)
    } else if end == start + 1 {
        format!("baseline line {}", start + 1)
    } else {
        format!("baseline lines {}-{}", start + 1, end)
    }
}

/// Merge line-oriented text.
pub fn merge(baseline: &str, current: &str, generated: &str, style: ConflictStyle) -> MergeOutcome {
    if current == generated || baseline == generated {
        return MergeOutcome::clean(current.to_string());
    }
    if baseline == current {
        return MergeOutcome::clean(generated.to_string());
    }

    let base = split_lines(baseline);
    let cur = split_lines(current);
    let gen = split_lines(generated);

    let mut all = hunks(&base, &cur, Side::Current);
    all.extend(hunks(&base, &gen, Side::Generated));
    all.sort_by_key(|h| (h.start, h.end, h.side));

    let mut out = String::new();
    let mut conflicts = Vec::new();
    let mut pos = 0;
    let mut i = 0;

    while i < all.len() {
        let start = all[i].start;
        let mut end = all[i].end;
        let mut j = i + 1;
        // Hunks that overlap or touch the open region join it.
        while j < all.len() && all[j].start <= end {
            end = end.max(all[j].end);
            j += 1;
        }
        let group = &all[i..j];

        for line in &base[pos..start] {
            out.push_str(line);
        }

        let has_current = group.iter().any(|h| h.side == Side::Current);
        let has_generated = group.iter().any(|h| h.side == Side::Generated);
        let ours = side_version(&base, group, Side::Current, start, end);
        let theirs = side_version(&base, group, Side::Generated, start, end);

        if !has_generated || ours == theirs {
            ours.iter().for_each(|l| out.push_str(l));
        } else if !has_current {
            theirs.iter().for_each(|l| out.push_str(l));
        } else {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&format!("<<<<<<< {}\n", CURRENT_LABEL));
            push_section(&mut out, &ours);
            if style == ConflictStyle::Diff3 {
                out.push_str(&format!("||||||| {}\n", BASELINE_LABEL));
                push_section(&mut out, &base[start..end]);
            }
            out.push_str("=======\n");
            push_section(&mut out, &theirs);
            out.push_str(&format!(">>>>>>> {}\n", GENERATED_LABEL));
            conflicts.push(describe_region(start, end));
        }

        pos = end;
        i = j;
    }

    for line in &base[pos..] {
        out.push_str(line);
    }

    MergeOutcome {
        content: out,
        conflicts,
    }
}

/// Whether `content` still holds conflict markers from an earlier merge.
pub fn has_conflict_markers(content: &str) -> bool {
    let open = format!("<<<<<<< {}", CURRENT_LABEL);
    let close = format!(">>>>>>> {}", GENERATED_LABEL);
    let mut opened = false;
    for line in content.lines() {
        if line == open {
            opened = true;
        } else if opened && line == close {
            return true;
        }
    }
    false
}
