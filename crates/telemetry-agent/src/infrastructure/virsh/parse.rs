//! Parsers for `virsh` command output

use std::collections::HashMap;

use crate::domain::metrics::error::SessionError;
use crate::domain::metrics::types::BlockDevice;
use crate::domain::metrics::types::BlockDeviceClass;
use crate::domain::metrics::types::BlockInfo;
use crate::domain::metrics::types::BlockStats;
use crate::domain::metrics::types::CpuTimes;
use crate::domain::metrics::types::InterfaceStats;
use crate::domain::metrics::types::MemoryStats;

type Result<T> = std::result::Result<T, SessionError>;

/// `list --name`: one domain name per line
pub fn domain_names(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// `domuuid`
pub fn domain_uuid(output: &str) -> Result<String> {
    let uuid = output.trim();
    if uuid.is_empty() {
        return Err(SessionError::parse("domuuid", "empty output"));
    }
    Ok(uuid.to_string())
}

/// `domstate`: shut off and crashed domains are inactive
pub fn domain_active(output: &str) -> Result<bool> {
    match output.trim() {
        "" => Err(SessionError::parse("domstate", "empty output")),
        "shut off" | "crashed" => Ok(false),
        _ => Ok(true),
    }
}

/// `vcpucount --maximum --live`
pub fn vcpu_count(output: &str) -> Result<u32> {
    output
        .trim()
        .parse()
        .map_err(|e| SessionError::parse("vcpucount", format!("{e}: {:?}", output.trim())))
}

/// `domstats --cpu-total --raw`: `cpu.time=<ns>` lines
pub fn cpu_times(output: &str) -> Result<CpuTimes> {
    let fields: HashMap<&str, &str> = output
        .lines()
        .filter_map(|line| line.trim().split_once('='))
        .collect();
    let read = |key: &str| -> Result<Option<u64>> {
        fields
            .get(key)
            .map(|value| number("domstats", key, value))
            .transpose()
    };

    Ok(CpuTimes {
        cpu_time: read("cpu.time")?
            .ok_or_else(|| SessionError::parse("domstats", "missing cpu.time"))?,
        system_time: read("cpu.system")?.unwrap_or(0),
        user_time: read("cpu.user")?.unwrap_or(0),
    })
}

/// `dommemstat`: `<name> <KiB>` lines. `unused` is absent without a balloon
/// driver reporting guest statistics and reads as 0.
pub fn memory_stats(output: &str) -> Result<MemoryStats> {
    let fields = pairs(output);
    let actual = fields
        .get("actual")
        .ok_or_else(|| SessionError::parse("dommemstat", "missing actual"))?;

    Ok(MemoryStats {
        actual_kb: number("dommemstat", "actual", actual)?,
        unused_kb: fields
            .get("unused")
            .map(|value| number("dommemstat", "unused", value))
            .transpose()?
            .unwrap_or(0),
    })
}

/// `domblklist --details`: `Type Device Target Source` table
pub fn block_devices(output: &str) -> Vec<BlockDevice> {
    table_rows(output)
        .filter_map(|columns| match columns.as_slice() {
            [_kind, device, target, ..] => Some(BlockDevice {
                target: (*target).to_string(),
                class: BlockDeviceClass::parse(device),
            }),
            _ => None,
        })
        .collect()
}

/// `domblkstat <domain> <target>`: `<target> <field> <value>` lines
pub fn block_stats(output: &str) -> Result<BlockStats> {
    let fields = device_counters(output);
    let read = |key: &str| required("domblkstat", &fields, key);

    Ok(BlockStats {
        read_requests: read("rd_req")?,
        read_bytes: read("rd_bytes")?,
        write_requests: read("wr_req")?,
        write_bytes: read("wr_bytes")?,
    })
}

/// `domblkinfo <domain> <target>`: `Capacity:` and `Allocation:` lines
pub fn block_info(output: &str) -> Result<BlockInfo> {
    let fields: HashMap<&str, &str> = output
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect();
    let read = |key: &str| required("domblkinfo", &fields, key);

    Ok(BlockInfo {
        capacity: read("Capacity")?,
        allocation: read("Allocation")?,
    })
}

/// `domiflist`: `Interface Type Source Model MAC` table. Interfaces without
/// a host side device are listed as `-` and skipped.
pub fn interfaces(output: &str) -> Vec<String> {
    table_rows(output)
        .filter_map(|columns| columns.first().copied())
        .filter(|name| *name != "-")
        .map(str::to_string)
        .collect()
}

/// `domifstat <domain> <target>`: `<target> <field> <value>` lines
pub fn interface_stats(output: &str) -> Result<InterfaceStats> {
    let fields = device_counters(output);
    let read = |key: &str| required("domifstat", &fields, key);

    Ok(InterfaceStats {
        rx_bytes: read("rx_bytes")?,
        rx_packets: read("rx_packets")?,
        rx_errors: read("rx_errs")?,
        tx_bytes: read("tx_bytes")?,
        tx_packets: read("tx_packets")?,
        tx_errors: read("tx_errs")?,
    })
}

fn number(what: &str, key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|e| SessionError::parse(what, format!("{key}={value:?}: {e}")))
}

fn required(what: &str, fields: &HashMap<&str, &str>, key: &str) -> Result<u64> {
    let value = fields
        .get(key)
        .ok_or_else(|| SessionError::parse(what, format!("missing {key}")))?;
    number(what, key, value)
}

fn pairs(output: &str) -> HashMap<&str, &str> {
    output
        .lines()
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            Some((columns.next()?, columns.next()?))
        })
        .collect()
}

// The first column repeats the device target
fn device_counters(output: &str) -> HashMap<&str, &str> {
    output
        .lines()
        .filter_map(|line| match line.split_whitespace().collect::<Vec<_>>()[..] {
            [_device, key, value] => Some((key, value)),
            _ => None,
        })
        .collect()
}

// Rows of a virsh table, below the header and its dashed separator
fn table_rows(output: &str) -> impl Iterator<Item = Vec<&str>> {
    output
        .lines()
        .skip_while(|line| !line.trim_start().starts_with('-'))
        .skip(1)
        .map(|line| line.split_whitespace().collect::<Vec<_>>())
        .filter(|columns| !columns.is_empty())
}
