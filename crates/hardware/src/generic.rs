// SPDX-License-Identifier: Apache-2.0

//! The generic hardware manager: probes that work on any Linux host.
//!
//! Block devices come from `lsblk`, NICs from `/sys/class/net`, CPU and
//! memory from procfs. Erasure prefers ATA secure erase and reports
//! `Unsupported` when the device has no known erase path, letting a more
//! specific manager take over.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use ira_core::{
    BlockDevice, Cpu, HardwareInfo, Memory, NetworkInterface, RestError, Step, StepArgInfo,
    StepInterface,
};

use crate::imaging::{ImageInfo, ImageWriter};
use crate::manager::{DispatchArgs, HardwareManager, HardwareSupport, MethodOutcome};
use crate::shell::{self, ShellError};

/// Minimum size for a disk to be considered the OS install target.
const MIN_INSTALL_DEVICE_SIZE: u64 = 4 << 30;

pub struct GenericHardwareManager {
    /// Filesystem root; only overridden by tests probing a fake tree.
    root: PathBuf,
    image_writer: Arc<dyn ImageWriter>,
}

impl GenericHardwareManager {
    pub fn new(image_writer: Arc<dyn ImageWriter>) -> Self {
        Self::with_root(PathBuf::from("/"), image_writer)
    }

    pub fn with_root(root: PathBuf, image_writer: Arc<dyn ImageWriter>) -> Self {
        Self { root, image_writer }
    }

    async fn list_hardware_info(&self) -> Result<HardwareInfo, RestError> {
        Ok(HardwareInfo {
            interfaces: self.list_network_interfaces().await?,
            cpu: self.get_cpus().await?,
            disks: self.list_block_devices().await?,
            memory: self.get_memory().await?,
        })
    }

    async fn list_network_interfaces(&self) -> Result<Vec<NetworkInterface>, RestError> {
        let net_dir = self.root.join("sys/class/net");
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&net_dir).await.map_err(|e| {
            RestError::command_execution(format!("cannot list {}: {e}", net_dir.display()))
        })?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        let mut interfaces = Vec::new();
        for name in names {
            // Physical devices only; bridges and loopbacks have no device link.
            if !net_dir.join(&name).join("device").exists() {
                continue;
            }
            let mac = tokio::fs::read_to_string(net_dir.join(&name).join("address"))
                .await
                .map(|s| s.trim().to_string())
                .unwrap_or_default();
            let has_carrier = tokio::fs::read_to_string(net_dir.join(&name).join("carrier"))
                .await
                .map(|s| s.trim() == "1")
                .unwrap_or(false);
            let (ipv4_address, ipv6_address) = self.interface_addresses(&name).await;
            interfaces.push(NetworkInterface {
                name,
                mac_address: mac,
                ipv4_address,
                ipv6_address,
                has_carrier,
            });
        }
        Ok(interfaces)
    }

    async fn interface_addresses(&self, name: &str) -> (Option<String>, Option<String>) {
        match shell::execute("ip", &["-o", "addr", "show", "dev", name]).await {
            Ok(output) => parse_ip_addr_output(&output.stdout),
            Err(err) => {
                warn!(interface = name, %err, "could not read addresses");
                (None, None)
            }
        }
    }

    async fn get_cpus(&self) -> Result<Cpu, RestError> {
        let text =
            tokio::fs::read_to_string(self.root.join("proc/cpuinfo")).await.map_err(|e| {
                RestError::command_execution(format!("cannot read cpuinfo: {e}"))
            })?;
        Ok(parse_cpuinfo(&text))
    }

    async fn get_memory(&self) -> Result<Memory, RestError> {
        let text =
            tokio::fs::read_to_string(self.root.join("proc/meminfo")).await.map_err(|e| {
                RestError::command_execution(format!("cannot read meminfo: {e}"))
            })?;
        parse_meminfo(&text)
            .map(|total| Memory { total })
            .ok_or_else(|| RestError::command_execution("meminfo has no MemTotal".to_string()))
    }

    async fn list_block_devices(&self) -> Result<Vec<BlockDevice>, RestError> {
        let report = shell::execute(
            "lsblk",
            &["-Pbdi", "-o", "KNAME,MODEL,SIZE,ROTA,TYPE,SERIAL"],
        )
        .await
        .map_err(|e| RestError::BlockDevice { details: e.to_string() })?;
        parse_lsblk_report(&report.stdout)
    }

    async fn get_os_install_device(&self) -> Result<String, RestError> {
        let devices = self.list_block_devices().await?;
        select_os_install_device(&devices).ok_or_else(|| RestError::DeviceNotFound {
            details: format!(
                "no suitable device found among {} block devices; need at least {} bytes",
                devices.len(),
                MIN_INSTALL_DEVICE_SIZE
            ),
        })
    }

    /// ATA secure erase. `Ok(false)` means the device has no supported
    /// erase path here and a more specific manager should take over.
    async fn ata_erase(&self, device: &BlockDevice) -> Result<bool, RestError> {
        let output = shell::execute("hdparm", &["-I", &device.name])
            .await
            .map_err(|e| erase_error(&device.name, &e))?;
        let security = parse_ata_security(&output.stdout);

        if !security.iter().any(|l| l == "supported") {
            return Ok(false);
        }
        if security.iter().any(|l| l == "enabled") {
            return Err(RestError::BlockDeviceErase {
                details: format!("block device {} already has a security password set", device.name),
            });
        }
        if !security.iter().any(|l| l == "not frozen") {
            return Err(RestError::BlockDeviceErase {
                details: format!("block device {} is frozen and cannot be erased", device.name),
            });
        }

        shell::execute(
            "hdparm",
            &["--user-master", "u", "--security-set-pass", "NULL", &device.name],
        )
        .await
        .map_err(|e| erase_error(&device.name, &e))?;
        shell::execute(
            "hdparm",
            &["--user-master", "u", "--security-erase", "NULL", &device.name],
        )
        .await
        .map_err(|e| erase_error(&device.name, &e))?;

        // Verify security is back off after the erase.
        let output = shell::execute("hdparm", &["-I", &device.name])
            .await
            .map_err(|e| erase_error(&device.name, &e))?;
        if !parse_ata_security(&output.stdout).iter().any(|l| l == "not enabled") {
            return Err(RestError::BlockDeviceErase {
                details: format!("an unknown error occurred erasing block device {}", device.name),
            });
        }
        Ok(true)
    }

    async fn erase_block_device(&self, device: &BlockDevice) -> MethodOutcome {
        match self.ata_erase(device).await {
            Ok(true) => MethodOutcome::Done(Ok(Value::Null)),
            Ok(false) => {
                warn!(device = %device.name, "no known way to erase device here");
                MethodOutcome::Unsupported
            }
            Err(err) => MethodOutcome::fail(err),
        }
    }

    async fn erase_devices(&self) -> MethodOutcome {
        let devices = match self.list_block_devices().await {
            Ok(devices) => devices,
            Err(err) => return MethodOutcome::fail(err),
        };
        for device in &devices {
            match self.erase_block_device(device).await {
                MethodOutcome::Done(Ok(_)) => {
                    info!(device = %device.name, "erased");
                }
                other => return other,
            }
        }
        MethodOutcome::done(format!("erased {} devices", devices.len()))
    }

    async fn erase_devices_metadata(&self) -> MethodOutcome {
        let devices = match self.list_block_devices().await {
            Ok(devices) => devices,
            Err(err) => return MethodOutcome::fail(err),
        };
        for device in &devices {
            if let Err(err) = shell::execute("wipefs", &["--force", "--all", &device.name]).await {
                return MethodOutcome::fail(RestError::BlockDeviceErase {
                    details: format!("wiping metadata of {} failed: {err}", device.name),
                });
            }
        }
        MethodOutcome::done(format!("wiped metadata of {} devices", devices.len()))
    }

    async fn write_image(&self, args: &DispatchArgs) -> Result<Value, RestError> {
        let image: ImageInfo = args
            .arg("image_info")
            .cloned()
            .ok_or_else(|| RestError::invalid_params("write_image requires image_info"))
            .and_then(|v| {
                serde_json::from_value(v)
                    .map_err(|e| RestError::invalid_params(format!("malformed image_info: {e}")))
            })?;
        let device = self.get_os_install_device().await?;
        self.image_writer.write_image(&image, &device).await?;
        if let Some(configdrive) = args.arg("configdrive").and_then(Value::as_str) {
            self.image_writer.write_configdrive(&device, configdrive).await?;
        }
        Ok(json!({ "image": image.id, "device": device }))
    }

    fn clean_steps(&self) -> Vec<Step> {
        let mut erase = Step::new("erase_devices", 10, StepInterface::Deploy);
        erase.abortable = true;
        let mut metadata = Step::new("erase_devices_metadata", 99, StepInterface::Deploy);
        metadata.abortable = true;
        vec![erase, metadata]
    }

    fn deploy_steps(&self) -> Vec<Step> {
        let mut write = Step::new("write_image", 80, StepInterface::Deploy);
        write.argsinfo = Some(
            [
                (
                    "image_info".to_string(),
                    StepArgInfo { description: "Image to write to the OS device".into(), required: true },
                ),
                (
                    "configdrive".to_string(),
                    StepArgInfo { description: "Configdrive payload".into(), required: false },
                ),
            ]
            .into_iter()
            .collect(),
        );
        vec![write]
    }
}

#[async_trait]
impl HardwareManager for GenericHardwareManager {
    fn name(&self) -> &'static str {
        "GenericHardwareManager"
    }

    async fn evaluate_hardware_support(&self) -> HardwareSupport {
        HardwareSupport::GENERIC
    }

    async fn dispatch(&self, method: &str, args: &DispatchArgs) -> MethodOutcome {
        match method {
            "list_hardware_info" => self.list_hardware_info().await.into(),
            "list_network_interfaces" => self.list_network_interfaces().await.into(),
            "get_cpus" => self.get_cpus().await.into(),
            "get_memory" => self.get_memory().await.into(),
            "list_block_devices" => self.list_block_devices().await.into(),
            "get_os_install_device" => self.get_os_install_device().await.into(),
            "erase_block_device" => match decode_device(args) {
                Ok(device) => self.erase_block_device(&device).await,
                Err(err) => MethodOutcome::fail(err),
            },
            "erase_devices" => self.erase_devices().await,
            "erase_devices_metadata" => self.erase_devices_metadata().await,
            "write_image" => self.write_image(args).await.into(),
            "get_clean_steps" => MethodOutcome::done(self.clean_steps()),
            "get_deploy_steps" => MethodOutcome::done(self.deploy_steps()),
            "get_service_steps" => MethodOutcome::done(Vec::<Step>::new()),
            _ => MethodOutcome::NoSuchMethod,
        }
    }
}

fn decode_device(args: &DispatchArgs) -> Result<BlockDevice, RestError> {
    let value = args
        .arg("block_device")
        .cloned()
        .ok_or_else(|| RestError::invalid_params("erase_block_device requires block_device"))?;
    serde_json::from_value(value)
        .map_err(|e| RestError::invalid_params(format!("malformed block_device: {e}")))
}

fn erase_error(device: &str, err: &ShellError) -> RestError {
    RestError::BlockDeviceErase { details: format!("erasing {device} failed: {err}") }
}

/// Parse `lsblk -Pbdi` KEY="value" output into block devices. Only rows
/// with TYPE disk survive; the required keys must all be present.
pub(crate) fn parse_lsblk_report(report: &str) -> Result<Vec<BlockDevice>, RestError> {
    let mut devices = Vec::new();
    for line in report.lines().filter(|l| !l.trim().is_empty()) {
        let fields = parse_key_value_line(line);
        if fields.get("TYPE").map(String::as_str) != Some("disk") {
            continue;
        }
        for key in ["KNAME", "MODEL", "SIZE", "ROTA"] {
            if !fields.contains_key(key) {
                return Err(RestError::BlockDevice {
                    details: format!("{key} must be returned by lsblk"),
                });
            }
        }
        let size = fields["SIZE"].parse::<u64>().map_err(|_| RestError::BlockDevice {
            details: format!("unparseable SIZE for {}: {:?}", fields["KNAME"], fields["SIZE"]),
        })?;
        devices.push(BlockDevice {
            name: format!("/dev/{}", fields["KNAME"]),
            model: fields["MODEL"].clone(),
            size,
            rotational: fields["ROTA"] == "1",
            serial: fields.get("SERIAL").filter(|s| !s.is_empty()).cloned(),
        });
    }
    Ok(devices)
}

/// Split a `KEY="value"` line, honouring spaces inside the quotes.
fn parse_key_value_line(line: &str) -> std::collections::HashMap<String, String> {
    let mut fields = std::collections::HashMap::new();
    let mut rest = line.trim();
    while let Some(eq) = rest.find("=\"") {
        let key = rest[..eq].trim().to_string();
        let after = &rest[eq + 2..];
        let Some(close) = after.find('"') else { break };
        fields.insert(key, after[..close].to_string());
        rest = &after[close + 1..];
    }
    fields
}

pub(crate) fn parse_cpuinfo(text: &str) -> Cpu {
    let mut model = None;
    let mut frequency = None;
    let mut count = 0u32;
    for line in text.lines() {
        if line.starts_with("processor") {
            count += 1;
        } else if model.is_none() && line.starts_with("model name") {
            model = line.split(':').nth(1).map(|s| s.trim().to_string());
        } else if frequency.is_none() && line.starts_with("cpu MHz") {
            frequency = line.split(':').nth(1).map(|s| s.trim().to_string());
        }
    }
    Cpu { model_name: model.unwrap_or_else(|| "unknown".to_string()), frequency, count }
}

/// MemTotal in bytes, from a meminfo dump.
pub(crate) fn parse_meminfo(text: &str) -> Option<u64> {
    let line = text.lines().find(|l| l.starts_with("MemTotal"))?;
    let kb = line.split_whitespace().nth(1)?.parse::<u64>().ok()?;
    Some(kb * 1024)
}

/// The smallest device that can hold an OS image.
pub(crate) fn select_os_install_device(devices: &[BlockDevice]) -> Option<String> {
    let mut candidates: Vec<&BlockDevice> =
        devices.iter().filter(|d| d.size >= MIN_INSTALL_DEVICE_SIZE).collect();
    candidates.sort_by_key(|d| d.size);
    candidates.first().map(|d| d.name.clone())
}

/// Addresses from `ip -o addr show` output.
pub(crate) fn parse_ip_addr_output(output: &str) -> (Option<String>, Option<String>) {
    let mut ipv4 = None;
    let mut ipv6 = None;
    for line in output.lines() {
        let mut tokens = line.split_whitespace();
        while let Some(token) = tokens.next() {
            match token {
                "inet" => {
                    if ipv4.is_none() {
                        ipv4 = tokens
                            .next()
                            .map(|a| a.split('/').next().unwrap_or(a).to_string());
                    }
                }
                "inet6" => {
                    if ipv6.is_none() {
                        ipv6 = tokens
                            .next()
                            .map(|a| a.split('/').next().unwrap_or(a).to_string());
                    }
                }
                _ => {}
            }
        }
    }
    (ipv4, ipv6)
}

/// Lines of the `Security:` section of `hdparm -I`, normalised.
pub(crate) fn parse_ata_security(output: &str) -> Vec<String> {
    let Some(section) = output.split("\nSecurity: \n").nth(1) else {
        return Vec::new();
    };
    let mut lines = Vec::new();
    for line in section.lines() {
        if line.starts_with('\t') || line.starts_with("  ") {
            lines.push(line.trim().replace('\t', " "));
        } else {
            break;
        }
    }
    lines
}

#[cfg(test)]
#[path = "generic_tests.rs"]
mod generic_tests;
