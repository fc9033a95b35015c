//! Host topology discovery.
//!
//! Logical CPU count comes from the scheduler; NUMA layout is parsed from
//! /sys/devices/system/node. Hosts without that tree (or without NUMA at
//! all) collapse to a single node holding every CPU. The struct is plain
//! data so tests can fabricate multi-node machines.

use std::fs;
use std::path::Path;

/// CPU and memory layout of the host, as seen at startup.
#[derive(Debug, Clone)]
pub struct Topology {
    pub num_logical_cpus: usize,
    pub cpus_per_node: Vec<Vec<usize>>,
    pub page_size: usize,
    pub huge_page_size: Option<usize>,
}

impl Topology {
    /// Probe the running host.
    pub fn detect() -> Self {
        let num_logical_cpus = num_cpus::get();
        let page_size = page_size();
        let huge_page_size = huge_page_size();

        let mut cpus_per_node = detect_numa_nodes();
        if cpus_per_node.is_empty() {
            cpus_per_node = vec![(0..num_logical_cpus).collect()];
        }

        Topology {
            num_logical_cpus,
            cpus_per_node,
            page_size,
            huge_page_size,
        }
    }

    /// A single-node topology covering `num_logical_cpus` CPUs. This is
    /// what `--ignore_numa` reduces to, and what tests build upon.
    pub fn single_node(num_logical_cpus: usize) -> Self {
        Topology {
            num_logical_cpus,
            cpus_per_node: vec![(0..num_logical_cpus).collect()],
            page_size: 4096,
            huge_page_size: Some(2 * 1024 * 1024),
        }
    }

    /// A fabricated topology with `nodes` equal nodes. Test helper.
    pub fn fabricated(nodes: usize, cpus_per: usize) -> Self {
        let cpus_per_node = (0..nodes)
            .map(|n| (n * cpus_per..(n + 1) * cpus_per).collect())
            .collect();
        Topology {
            num_logical_cpus: nodes * cpus_per,
            cpus_per_node,
            page_size: 4096,
            huge_page_size: Some(2 * 1024 * 1024),
        }
    }

    pub fn num_numa_nodes(&self) -> usize {
        self.cpus_per_node.len()
    }

    pub fn cpus_in_node(&self, node: usize) -> &[usize] {
        self.cpus_per_node
            .get(node)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

fn page_size() -> usize {
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if sz > 0 {
        sz as usize
    } else {
        4096
    }
}

/// Read the default huge page size from /proc/meminfo ("Hugepagesize").
/// Returns None when the kernel reports no huge page support.
fn huge_page_size() -> Option<usize> {
    let content = fs::read_to_string("/proc/meminfo").ok()?;
    for line in content.lines() {
        if line.starts_with("Hugepagesize") {
            let kb: usize = line.split_whitespace().nth(1)?.parse().ok()?;
            if kb > 0 {
                return Some(kb * 1024);
            }
        }
    }
    None
}

fn detect_numa_nodes() -> Vec<Vec<usize>> {
    let mut nodes = Vec::new();
    for node in 0.. {
        let path = format!("/sys/devices/system/node/node{}/cpulist", node);
        if !Path::new(&path).exists() {
            break;
        }
        match fs::read_to_string(&path) {
            Ok(list) => nodes.push(parse_cpu_list(list.trim())),
            Err(_) => break,
        }
    }
    nodes
}

/// Parse the kernel's cpulist format, e.g. "0-3,8-11,16".
fn parse_cpu_list(list: &str) -> Vec<usize> {
    let mut cpus = Vec::new();
    for part in list.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((lo, hi)) = part.split_once('-') {
            if let (Ok(lo), Ok(hi)) = (lo.parse::<usize>(), hi.parse::<usize>()) {
                cpus.extend(lo..=hi);
            }
        } else if let Ok(cpu) = part.parse::<usize>() {
            cpus.push(cpu);
        }
    }
    cpus
}
