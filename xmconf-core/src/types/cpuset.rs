//! Physical CPU affinity sets.
//!
//! The textual form is the one used by `cpus = "..."`: comma-separated
//! indices and `a-b` ranges, where `^n` removes a CPU added earlier in the
//! expression, e.g. `"0-7,^3"`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Highest number of physical CPUs an affinity set can describe.
pub const MAX_PHYSICAL_CPUS: usize = 1024;

const WORDS: usize = MAX_PHYSICAL_CPUS / 64;

/// Fixed-capacity CPU bitmask.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CpuSet {
    bits: [u64; WORDS],
}

impl CpuSet {
    pub fn new() -> Self {
        Self { bits: [0; WORDS] }
    }

    /// Build from a byte map where bit `j` of byte `i` is CPU `i * 8 + j`.
    pub fn from_bytes(map: &[u8]) -> Result<Self, String> {
        if map.is_empty() || map.len() > MAX_PHYSICAL_CPUS / 8 {
            return Err(format!("CPU map must be 1..={} bytes", MAX_PHYSICAL_CPUS / 8));
        }
        let mut set = Self::new();
        for (i, byte) in map.iter().enumerate() {
            for j in 0..8 {
                if byte & (1 << j) != 0 {
                    set.insert(i * 8 + j);
                }
            }
        }
        Ok(set)
    }

    /// The byte-map form accepted by [`CpuSet::from_bytes`], trimmed after
    /// the highest CPU.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut map = Vec::new();
        for cpu in self.iter() {
            if map.len() <= cpu / 8 {
                map.resize(cpu / 8 + 1, 0);
            }
            map[cpu / 8] |= 1 << (cpu % 8);
        }
        map
    }

    pub fn insert(&mut self, cpu: usize) -> bool {
        if cpu >= MAX_PHYSICAL_CPUS {
            return false;
        }
        self.bits[cpu / 64] |= 1 << (cpu % 64);
        true
    }

    pub fn remove(&mut self, cpu: usize) {
        if cpu < MAX_PHYSICAL_CPUS {
            self.bits[cpu / 64] &= !(1 << (cpu % 64));
        }
    }

    pub fn contains(&self, cpu: usize) -> bool {
        cpu < MAX_PHYSICAL_CPUS && self.bits[cpu / 64] & (1 << (cpu % 64)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_PHYSICAL_CPUS).filter(move |cpu| self.contains(*cpu))
    }
}

impl Default for CpuSet {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_cpu(s: &str, expr: &str) -> Result<usize, String> {
    let cpu: usize = s.trim().parse().map_err(|_| format!("bad CPU number '{}' in '{}'", s, expr))?;
    if cpu >= MAX_PHYSICAL_CPUS {
        return Err(format!("CPU {} exceeds maximum of {}", cpu, MAX_PHYSICAL_CPUS - 1));
    }
    Ok(cpu)
}

impl FromStr for CpuSet {
    type Err = String;

    fn from_str(expr: &str) -> Result<Self, Self::Err> {
        let mut set = Self::new();
        for item in expr.split(',').map(str::trim) {
            if item.is_empty() {
                return Err(format!("empty element in CPU set '{}'", expr));
            }
            if let Some(neg) = item.strip_prefix('^') {
                set.remove(parse_cpu(neg, expr)?);
                continue;
            }
            match item.split_once('-') {
                Some((lo, hi)) => {
                    let (lo, hi) = (parse_cpu(lo, expr)?, parse_cpu(hi, expr)?);
                    if lo > hi {
                        return Err(format!("descending range '{}' in '{}'", item, expr));
                    }
                    for cpu in lo..=hi {
                        set.insert(cpu);
                    }
                }
                None => {
                    set.insert(parse_cpu(item, expr)?);
                }
            }
        }
        Ok(set)
    }
}

impl fmt::Display for CpuSet {
    /// Compact ranges, e.g. "0-3,5,8-9".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut cpus = self.iter().peekable();
        while let Some(start) = cpus.next() {
            let mut end = start;
            while cpus.peek() == Some(&(end + 1)) {
                end += 1;
                cpus.next();
            }
            if !first {
                f.write_str(",")?;
            }
            first = false;
            if end == start {
                write!(f, "{}", start)?;
            } else {
                write!(f, "{}-{}", start, end)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CpuSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CpuSet({})", self)
    }
}

impl From<CpuSet> for String {
    fn from(set: CpuSet) -> Self {
        set.to_string()
    }
}

impl TryFrom<String> for CpuSet {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ranges() {
        let set: CpuSet = "0-3,5, 8-9".parse().unwrap();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 1, 2, 3, 5, 8, 9]);
        assert_eq!(set.to_string(), "0-3,5,8-9");
    }

    #[test]
    fn test_parse_negation() {
        let set: CpuSet = "0-7,^3".parse().unwrap();
        assert!(!set.contains(3));
        assert_eq!(set.count(), 7);
        assert_eq!(set.to_string(), "0-2,4-7");
    }

    #[test]
    fn test_parse_errors() {
        assert!("".parse::<CpuSet>().is_err());
        assert!("1,,2".parse::<CpuSet>().is_err());
        assert!("4-2".parse::<CpuSet>().is_err());
        assert!("1024".parse::<CpuSet>().is_err());
        assert!("x".parse::<CpuSet>().is_err());
    }

    #[test]
    fn test_from_bytes() {
        let set = CpuSet::from_bytes(&[0b0000_0101, 0b0000_0001]).unwrap();
        assert_eq!(set.to_string(), "0,2,8");
        assert!(CpuSet::from_bytes(&[]).is_err());
        assert_eq!(set.to_bytes(), vec![0b0000_0101, 0b0000_0001]);
        assert!(CpuSet::new().to_bytes().is_empty());
    }

    #[test]
    fn test_capacity_edge() {
        let set: CpuSet = "1023".parse().unwrap();
        assert!(set.contains(1023));
        assert_eq!(set.to_string(), "1023");
    }
}
