// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Value domains: the allowed values of a column, as sorted disjoint ranges
//! plus a nullability flag, and tuple domains mapping columns to domains.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::hash::Hash;
use std::ops::Bound;

use crate::spec::{Datum, PrimitiveLiteral};

/// A contiguous range of values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    low: Bound<Datum>,
    high: Bound<Datum>,
}

// Orders datums of the same type, `None` when the types don't compare.
fn compare(a: &Datum, b: &Datum) -> Option<Ordering> {
    a.partial_cmp(b)
}

fn is_nan(datum: &Datum) -> bool {
    match datum.literal() {
        PrimitiveLiteral::Float(v) => v.is_nan(),
        PrimitiveLiteral::Double(v) => v.is_nan(),
        _ => false,
    }
}

// The tighter of two low bounds.
fn max_low(a: &Bound<Datum>, b: &Bound<Datum>) -> Bound<Datum> {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
        (Bound::Included(x) | Bound::Excluded(x), Bound::Included(y) | Bound::Excluded(y)) => {
            match compare(x, y).unwrap_or(Ordering::Equal) {
                Ordering::Greater => a.clone(),
                Ordering::Less => b.clone(),
                Ordering::Equal if matches!(a, Bound::Excluded(_)) => a.clone(),
                Ordering::Equal => b.clone(),
            }
        }
    }
}

// The tighter of two high bounds.
fn min_high(a: &Bound<Datum>, b: &Bound<Datum>) -> Bound<Datum> {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
        (Bound::Included(x) | Bound::Excluded(x), Bound::Included(y) | Bound::Excluded(y)) => {
            match compare(x, y).unwrap_or(Ordering::Equal) {
                Ordering::Less => a.clone(),
                Ordering::Greater => b.clone(),
                Ordering::Equal if matches!(a, Bound::Excluded(_)) => a.clone(),
                Ordering::Equal => b.clone(),
            }
        }
    }
}

// The looser of two low bounds.
fn min_low(a: &Bound<Datum>, b: &Bound<Datum>) -> Bound<Datum> {
    match (a, b) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => Bound::Unbounded,
        (Bound::Included(x) | Bound::Excluded(x), Bound::Included(y) | Bound::Excluded(y)) => {
            match compare(x, y).unwrap_or(Ordering::Equal) {
                Ordering::Less => a.clone(),
                Ordering::Greater => b.clone(),
                Ordering::Equal if matches!(a, Bound::Included(_)) => a.clone(),
                Ordering::Equal => b.clone(),
            }
        }
    }
}

// The looser of two high bounds.
fn max_high(a: &Bound<Datum>, b: &Bound<Datum>) -> Bound<Datum> {
    match (a, b) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => Bound::Unbounded,
        (Bound::Included(x) | Bound::Excluded(x), Bound::Included(y) | Bound::Excluded(y)) => {
            match compare(x, y).unwrap_or(Ordering::Equal) {
                Ordering::Greater => a.clone(),
                Ordering::Less => b.clone(),
                Ordering::Equal if matches!(a, Bound::Included(_)) => a.clone(),
                Ordering::Equal => b.clone(),
            }
        }
    }
}

// Orders ranges by their low bound, unbounded first.
fn cmp_low(a: &Bound<Datum>, b: &Bound<Datum>) -> Ordering {
    match (a, b) {
        (Bound::Unbounded, Bound::Unbounded) => Ordering::Equal,
        (Bound::Unbounded, _) => Ordering::Less,
        (_, Bound::Unbounded) => Ordering::Greater,
        (Bound::Included(x) | Bound::Excluded(x), Bound::Included(y) | Bound::Excluded(y)) => {
            match compare(x, y).unwrap_or(Ordering::Equal) {
                Ordering::Equal => match (a, b) {
                    (Bound::Included(_), Bound::Excluded(_)) => Ordering::Less,
                    (Bound::Excluded(_), Bound::Included(_)) => Ordering::Greater,
                    _ => Ordering::Equal,
                },
                ord => ord,
            }
        }
    }
}

impl Range {
    /// Creates a range, or `None` when the bounds describe no value.
    pub fn new(low: Bound<Datum>, high: Bound<Datum>) -> Option<Self> {
        let non_empty = match (&low, &high) {
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => true,
            (Bound::Included(l), Bound::Included(h)) => {
                matches!(compare(l, h), Some(Ordering::Less | Ordering::Equal) | None)
            }
            (Bound::Included(l) | Bound::Excluded(l), Bound::Included(h) | Bound::Excluded(h)) => {
                matches!(compare(l, h), Some(Ordering::Less) | None)
            }
        };
        non_empty.then_some(Self { low, high })
    }

    /// The range of every value.
    pub fn all() -> Self {
        Self {
            low: Bound::Unbounded,
            high: Bound::Unbounded,
        }
    }

    /// `[value, value]`
    pub fn equal(value: Datum) -> Self {
        Self {
            low: Bound::Included(value.clone()),
            high: Bound::Included(value),
        }
    }

    /// `(value, +inf)`
    pub fn greater_than(value: Datum) -> Self {
        Self {
            low: Bound::Excluded(value),
            high: Bound::Unbounded,
        }
    }

    /// `[value, +inf)`
    pub fn greater_than_or_equal(value: Datum) -> Self {
        Self {
            low: Bound::Included(value),
            high: Bound::Unbounded,
        }
    }

    /// `(-inf, value)`
    pub fn less_than(value: Datum) -> Self {
        Self {
            low: Bound::Unbounded,
            high: Bound::Excluded(value),
        }
    }

    /// `(-inf, value]`
    pub fn less_than_or_equal(value: Datum) -> Self {
        Self {
            low: Bound::Unbounded,
            high: Bound::Included(value),
        }
    }

    /// Low bound.
    pub fn low(&self) -> &Bound<Datum> {
        &self.low
    }

    /// High bound.
    pub fn high(&self) -> &Bound<Datum> {
        &self.high
    }

    /// Whether this range covers every value.
    pub fn is_all(&self) -> bool {
        matches!((&self.low, &self.high), (Bound::Unbounded, Bound::Unbounded))
    }

    /// The value of a `[v, v]` range.
    pub fn single_value(&self) -> Option<&Datum> {
        match (&self.low, &self.high) {
            (Bound::Included(l), Bound::Included(h)) if l == h => Some(l),
            _ => None,
        }
    }

    /// Whether `value` lies in this range. Values of another type are never contained.
    pub fn contains(&self, value: &Datum) -> bool {
        let above_low = match &self.low {
            Bound::Unbounded => true,
            Bound::Included(l) => matches!(compare(value, l), Some(Ordering::Greater | Ordering::Equal)),
            Bound::Excluded(l) => matches!(compare(value, l), Some(Ordering::Greater)),
        };
        let below_high = match &self.high {
            Bound::Unbounded => true,
            Bound::Included(h) => matches!(compare(value, h), Some(Ordering::Less | Ordering::Equal)),
            Bound::Excluded(h) => matches!(compare(value, h), Some(Ordering::Less)),
        };
        above_low && below_high
    }

    /// Whether this range may share a value with `[min, max]`.
    ///
    /// Bounds that don't compare with the range (another type, NaN) never
    /// exclude anything.
    pub fn overlaps(&self, min: &Datum, max: &Datum) -> bool {
        if is_nan(min) || is_nan(max) {
            return true;
        }
        let max_reaches_low = match &self.low {
            Bound::Unbounded => true,
            Bound::Included(l) => !matches!(compare(max, l), Some(Ordering::Less)),
            Bound::Excluded(l) => !matches!(compare(max, l), Some(Ordering::Less | Ordering::Equal)),
        };
        let min_reaches_high = match &self.high {
            Bound::Unbounded => true,
            Bound::Included(h) => !matches!(compare(min, h), Some(Ordering::Greater)),
            Bound::Excluded(h) => {
                !matches!(compare(min, h), Some(Ordering::Greater | Ordering::Equal))
            }
        };
        max_reaches_low && min_reaches_high
    }

    /// The values in both ranges, if any.
    pub fn intersect(&self, other: &Range) -> Option<Range> {
        Range::new(max_low(&self.low, &other.low), min_high(&self.high, &other.high))
    }

    /// The smallest range covering both ranges.
    pub fn span(&self, other: &Range) -> Range {
        Range {
            low: min_low(&self.low, &other.low),
            high: max_high(&self.high, &other.high),
        }
    }

    // Whether `next`, which starts at or after `self`, overlaps or touches `self`.
    fn connects(&self, next: &Range) -> bool {
        match (&self.high, &next.low) {
            (Bound::Unbounded, _) | (_, Bound::Unbounded) => true,
            (Bound::Excluded(h), Bound::Excluded(l)) => {
                matches!(compare(h, l), Some(Ordering::Greater) | None)
            }
            (Bound::Included(h) | Bound::Excluded(h), Bound::Included(l) | Bound::Excluded(l)) => {
                matches!(compare(h, l), Some(Ordering::Greater | Ordering::Equal) | None)
            }
        }
    }
}

impl Display for Range {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.low {
            Bound::Unbounded => write!(f, "(<min>")?,
            Bound::Included(v) => write!(f, "[{v}")?,
            Bound::Excluded(v) => write!(f, "({v}")?,
        }
        match &self.high {
            Bound::Unbounded => write!(f, ", <max>)"),
            Bound::Included(v) => write!(f, ", {v}]"),
            Bound::Excluded(v) => write!(f, ", {v})"),
        }
    }
}

// Sorts ranges and merges the ones that overlap or touch.
fn normalize(mut ranges: Vec<Range>) -> Vec<Range> {
    ranges.sort_by(|a, b| cmp_low(&a.low, &b.low));
    let mut merged: Vec<Range> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if last.connects(&range) => *last = last.span(&range),
            _ => merged.push(range),
        }
    }
    merged
}

/// The allowed values of one column.
///
/// An empty range list with `null_allowed == false` is the domain that
/// matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    ranges: Vec<Range>,
    null_allowed: bool,
}

impl Domain {
    /// Every value, and null.
    pub fn all() -> Self {
        Self {
            ranges: vec![Range::all()],
            null_allowed: true,
        }
    }

    /// Nothing at all.
    pub fn none() -> Self {
        Self {
            ranges: vec![],
            null_allowed: false,
        }
    }

    /// Only null.
    pub fn only_null() -> Self {
        Self {
            ranges: vec![],
            null_allowed: true,
        }
    }

    /// Every non-null value.
    pub fn not_null() -> Self {
        Self {
            ranges: vec![Range::all()],
            null_allowed: false,
        }
    }

    /// Exactly `value`.
    pub fn single_value(value: Datum) -> Self {
        Self::from_ranges(vec![Range::equal(value)], false)
    }

    /// Any of `values`.
    pub fn multiple_values(values: impl IntoIterator<Item = Datum>) -> Self {
        Self::from_ranges(values.into_iter().map(Range::equal).collect(), false)
    }

    /// A domain from possibly overlapping, unsorted ranges.
    pub fn from_ranges(ranges: Vec<Range>, null_allowed: bool) -> Self {
        Self {
            ranges: normalize(ranges),
            null_allowed,
        }
    }

    /// Sorted, disjoint ranges of allowed values.
    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// Whether the domain allows no value at all.
    pub fn is_none(&self) -> bool {
        self.ranges.is_empty() && !self.null_allowed
    }

    /// Whether the domain allows everything.
    pub fn is_all(&self) -> bool {
        self.null_allowed && self.ranges.len() == 1 && self.ranges[0].is_all()
    }

    /// Whether null is allowed.
    pub fn includes_null(&self) -> bool {
        self.null_allowed
    }

    /// Whether a non-null value is allowed.
    pub fn includes_value(&self, value: &Datum) -> bool {
        self.ranges.iter().any(|r| r.contains(value))
    }

    /// Whether a possibly null value is allowed.
    pub fn includes(&self, value: Option<&Datum>) -> bool {
        match value {
            Some(value) => self.includes_value(value),
            None => self.null_allowed,
        }
    }

    /// The values allowed by both domains.
    pub fn intersect(&self, other: &Domain) -> Domain {
        let ranges = self
            .ranges
            .iter()
            .flat_map(|a| other.ranges.iter().filter_map(|b| a.intersect(b)))
            .collect();
        Domain::from_ranges(ranges, self.null_allowed && other.null_allowed)
    }

    /// Collapses the domain to a single spanning range once it holds more
    /// than `threshold` ranges.
    pub fn simplify(&self, threshold: usize) -> Domain {
        if self.ranges.len() <= threshold {
            return self.clone();
        }
        let span = self.ranges.iter().skip(1).fold(self.ranges[0].clone(), |acc, r| acc.span(r));
        Domain {
            ranges: vec![span],
            null_allowed: self.null_allowed,
        }
    }

    /// The values of a domain made only of single values.
    pub fn discrete_values(&self) -> Option<Vec<&Datum>> {
        if self.ranges.is_empty() {
            return None;
        }
        self.ranges.iter().map(Range::single_value).collect()
    }

    /// Whether a group of values summarized by its statistics may hold an
    /// allowed value.
    ///
    /// `min` and `max` are the non-null bounds, `null_count` the number of
    /// nulls when known, and `value_count` the number of values including
    /// nulls. Missing statistics never exclude anything.
    pub fn overlaps_stats(
        &self,
        min: Option<&Datum>,
        max: Option<&Datum>,
        null_count: Option<u64>,
        value_count: u64,
    ) -> bool {
        if self.is_none() {
            return false;
        }
        if value_count > 0 && null_count == Some(value_count) {
            return self.null_allowed;
        }
        if self.null_allowed && null_count != Some(0) {
            return true;
        }
        match (min, max) {
            (Some(min), Some(max)) => self.ranges.iter().any(|r| r.overlaps(min, max)),
            _ => !self.ranges.is_empty(),
        }
    }
}

impl Display for Domain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let ranges = self.ranges.iter().map(|r| r.to_string()).collect::<Vec<_>>();
        write!(f, "{{{}", ranges.join(", "))?;
        if self.null_allowed {
            write!(f, "{}NULL", if ranges.is_empty() { "" } else { ", " })?;
        }
        write!(f, "}}")
    }
}

/// A conjunction of per-column domains.
///
/// `None` domains mean the tuple domain matches nothing; columns absent from
/// the map are unconstrained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleDomain<C: Eq + Hash> {
    domains: Option<HashMap<C, Domain>>,
}

impl<C: Eq + Hash + Clone> TupleDomain<C> {
    /// Matches everything.
    pub fn all() -> Self {
        Self {
            domains: Some(HashMap::new()),
        }
    }

    /// Matches nothing.
    pub fn none() -> Self {
        Self { domains: None }
    }

    /// A tuple domain from per-column domains.
    ///
    /// Any `none` domain makes the whole tuple domain `none`; `all` domains
    /// are dropped.
    pub fn with_column_domains(domains: impl IntoIterator<Item = (C, Domain)>) -> Self {
        let mut map = HashMap::new();
        for (column, domain) in domains {
            if domain.is_none() {
                return Self::none();
            }
            if !domain.is_all() {
                map.insert(column, domain);
            }
        }
        Self { domains: Some(map) }
    }

    /// Whether this matches nothing.
    pub fn is_none(&self) -> bool {
        self.domains.is_none()
    }

    /// Whether this matches everything.
    pub fn is_all(&self) -> bool {
        matches!(&self.domains, Some(domains) if domains.is_empty())
    }

    /// The column domains, `None` when this matches nothing.
    pub fn domains(&self) -> Option<&HashMap<C, Domain>> {
        self.domains.as_ref()
    }

    /// The domain of one column, `None` when the column is unconstrained or
    /// this matches nothing.
    pub fn domain(&self, column: &C) -> Option<&Domain> {
        self.domains.as_ref()?.get(column)
    }

    /// Rows matching both tuple domains.
    pub fn intersect(&self, other: &TupleDomain<C>) -> TupleDomain<C> {
        let (Some(left), Some(right)) = (&self.domains, &other.domains) else {
            return Self::none();
        };
        let mut merged = left.clone();
        for (column, domain) in right {
            let combined = match merged.get(column) {
                Some(existing) => existing.intersect(domain),
                None => domain.clone(),
            };
            merged.insert(column.clone(), combined);
        }
        Self::with_column_domains(merged)
    }

    /// Collapses every column domain holding more than `threshold` ranges.
    pub fn simplify(&self, threshold: usize) -> TupleDomain<C> {
        match &self.domains {
            None => Self::none(),
            Some(domains) => Self::with_column_domains(
                domains
                    .iter()
                    .map(|(c, d)| (c.clone(), d.simplify(threshold))),
            ),
        }
    }

    /// Keeps only the columns accepted by `keep`.
    pub fn filter(&self, mut keep: impl FnMut(&C) -> bool) -> TupleDomain<C> {
        match &self.domains {
            None => Self::none(),
            Some(domains) => Self {
                domains: Some(
                    domains
                        .iter()
                        .filter(|(c, _)| keep(c))
                        .map(|(c, d)| (c.clone(), d.clone()))
                        .collect(),
                ),
            },
        }
    }
}

impl<C: Eq + Hash + Clone> Default for TupleDomain<C> {
    fn default() -> Self {
        Self::all()
    }
}
