use std::fmt::{Display, Formatter};
use std::str::FromStr;

use nom::bytes::complete::tag;
use nom::character::complete::space0;
use nom::combinator::{map_res, opt};
use nom::multi::separated_list1;
use nom::sequence::{delimited, preceded, tuple};

use crate::common::parser::{NomResult, consume_all, p_u32};

/// Sorted set of CPU ids, written in the Linux cpulist format (`0-3,8`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CpuSet {
    cpus: Vec<u32>,
}

impl CpuSet {
    pub fn new(mut cpus: Vec<u32>) -> Self {
        cpus.sort_unstable();
        cpus.dedup();
        Self { cpus }
    }

    /// Parses a cpulist, an empty (or whitespace only) string is an empty set.
    pub fn parse(input: &str) -> anyhow::Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Ok(Self::default());
        }
        consume_all(p_cpu_ranges, input).map(Self::new)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.cpus.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.cpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpus.is_empty()
    }

    pub fn contains(&self, cpu: u32) -> bool {
        self.cpus.binary_search(&cpu).is_ok()
    }
}

impl FromStr for CpuSet {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for CpuSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut iter = self.cpus.iter().copied().peekable();
        let mut first = true;
        while let Some(start) = iter.next() {
            let mut end = start;
            while iter.peek() == Some(&(end + 1)) {
                end += 1;
                iter.next();
            }
            if !first {
                f.write_str(",")?;
            }
            first = false;
            if start == end {
                write!(f, "{start}")?;
            } else {
                write!(f, "{start}-{end}")?;
            }
        }
        Ok(())
    }
}

fn p_cpu_range(input: &str) -> NomResult<'_, Vec<u32>> {
    map_res(
        tuple((
            p_u32,
            opt(preceded(tuple((space0, tag("-"), space0)), p_u32)),
        )),
        |(start, end)| {
            let end = end.unwrap_or(start);
            if start > end {
                Err(anyhow::anyhow!("range start {start} is greater than end {end}"))
            } else {
                Ok((start..=end).collect())
            }
        },
    )(input)
}

fn p_cpu_ranges(input: &str) -> NomResult<'_, Vec<u32>> {
    separated_list1(delimited(space0, tag(","), space0), p_cpu_range)(input)
        .map(|(rest, ranges)| (rest, ranges.into_iter().flatten().collect()))
}
