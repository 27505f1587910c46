//! Mount table line parser for Linux systems.
//!
//! Parses lines in `/proc/[pid]/mounts` format, which shares the layout of
//! [`fstab(5)`](https://man7.org/linux/man-pages/man5/fstab.5.html): six
//! whitespace-separated fields per record.

/// Number of fields every mount table record must carry.
pub const MOUNT_FIELD_COUNT: usize = 6;

/// Represents a parsed mount table record.
#[derive(Debug, PartialEq, Eq)]
pub struct MountEntry<'a> {
    /// Mounted device or pseudo filesystem source (`cgroup` for v1 controllers).
    pub fs_spec: &'a str,
    /// Mount point, exactly as the kernel reports it.
    pub fs_file: &'a str,
    /// Filesystem type.
    pub fs_type: &'a str,
    /// Comma-separated mount options. For cgroup v1 mounts this lists the
    /// attached controllers.
    pub fs_mntops: &'a str,
    /// Dump frequency field.
    pub fs_freq: &'a str,
    /// fsck pass number field.
    pub fs_passno: &'a str,
}

impl MountEntry<'_> {
    /// Returns `true` if this record is a cgroup v1 mount whose options mention `controller`.
    ///
    /// The match is a plain substring test on the option string, so combined
    /// controller names such as `cpu,cpuacct` are matched as written.
    pub fn is_cgroup_controller(&self, controller: &str) -> bool {
        self.fs_spec == "cgroup" && self.fs_mntops.contains(controller)
    }
}

/// Errors that may occur when parsing a mount table line.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("expected 6 fields but found {found} in line: `{line}`")]
    FieldCount { found: usize, line: String },
}

/// Parses a single line of mount table data.
///
/// The line is split on whitespace; anything other than exactly
/// [`MOUNT_FIELD_COUNT`] fields is rejected.
///
/// # Errors
///
/// Returns [`ParseError::FieldCount`] if the record has too few or too many fields.
pub fn parse_mount_line(line: &str) -> Result<MountEntry<'_>, ParseError> {
    let mut fields = [""; MOUNT_FIELD_COUNT];
    let mut found = 0;
    for field in line.split_whitespace() {
        if found < MOUNT_FIELD_COUNT {
            fields[found] = field;
        }
        found += 1;
    }

    if found != MOUNT_FIELD_COUNT {
        return Err(ParseError::FieldCount {
            found,
            line: line.to_owned(),
        });
    }

    let [fs_spec, fs_file, fs_type, fs_mntops, fs_freq, fs_passno] = fields;
    Ok(MountEntry {
        fs_spec,
        fs_file,
        fs_type,
        fs_mntops,
        fs_freq,
        fs_passno,
    })
}
