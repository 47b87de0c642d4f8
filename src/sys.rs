//! Interact with the `/sys` pseudo-file system

use std::fs;
use std::path::Path;

use crate::error::Result;

/// The names of the entries of a directory, sorted
fn dir_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(String::from))
        .collect::<Vec<_>>();
    names.sort();
    Ok(names)
}

pub mod class {
    //! Devices grouped by what they do, under /sys/class
    pub mod hwmon {
        //! Hardware monitoring chips
        //!
        //! https://www.kernel.org/doc/Documentation/hwmon/sysfs-interface
        use std::path::Path;

        use lazy_static::lazy_static;
        use regex::Regex;
        use tracing::debug;

        use crate::error::Result;
        use crate::procfs::read_file;
        use crate::sys::dir_names;

        lazy_static! {
            static ref TEMP_INPUT: Regex = Regex::new(r"^temp([0-9]+)_input$").unwrap();
            static ref NOT_KEY: Regex = Regex::new(r"[^A-Za-z0-9]+").unwrap();
        }

        /// One temperature sensor, all values in degrees Celsius
        #[derive(Debug, Clone, PartialEq)]
        pub struct Sensor {
            pub chip: String,
            pub label: String,
            pub celsius: f64,
            /// The chip's own high-temperature limit, if it reports one
            pub max: Option<f64>,
            /// The chip's own critical limit, if it reports one
            pub crit: Option<f64>,
        }

        impl Sensor {
            /// `chip/label`, what `--sensor` patterns match against
            pub fn name(&self) -> String {
                format!("{}/{}", self.chip, self.label)
            }

            /// A name safe to use as a perf data key
            pub fn perf_key(&self) -> String {
                let key = format!("{}_{}", self.chip, self.label);
                NOT_KEY.replace_all(&key, "_").trim_matches('_').to_owned()
            }
        }

        fn millidegrees(path: &Path) -> Option<f64> {
            read_file(path)
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .map(|m| m / 1000.0)
        }

        /// Every readable temperature sensor on the system
        pub fn temperatures() -> Result<Vec<Sensor>> {
            temperatures_in("/sys/class/hwmon")
        }

        pub fn temperatures_in<P: AsRef<Path>>(root: P) -> Result<Vec<Sensor>> {
            let root = root.as_ref();
            let mut sensors = Vec::new();
            for chip_dir in dir_names(root)? {
                let dir = root.join(&chip_dir);
                let chip = read_file(dir.join("name"))
                    .map(|name| name.trim().to_owned())
                    .unwrap_or_else(|_| chip_dir.clone());
                let files = match dir_names(&dir) {
                    Ok(files) => files,
                    Err(_) => continue,
                };
                let mut inputs = files
                    .into_iter()
                    .filter_map(|f| {
                        TEMP_INPUT
                            .captures(&f)
                            .and_then(|caps| caps[1].parse::<u32>().ok())
                    })
                    .collect::<Vec<_>>();
                inputs.sort_unstable();
                for idx in inputs {
                    let input = dir.join(format!("temp{}_input", idx));
                    // Some chips expose inputs that fail to read (EIO, ENODATA)
                    let celsius = match millidegrees(&input) {
                        Some(c) => c,
                        None => {
                            debug!(path = %input.display(), "unreadable sensor");
                            continue;
                        }
                    };
                    let label = read_file(dir.join(format!("temp{}_label", idx)))
                        .map(|l| l.trim().to_owned())
                        .unwrap_or_else(|_| format!("temp{}", idx));
                    sensors.push(Sensor {
                        chip: chip.clone(),
                        label,
                        celsius,
                        max: millidegrees(&dir.join(format!("temp{}_max", idx))),
                        crit: millidegrees(&dir.join(format!("temp{}_crit", idx))),
                    });
                }
            }
            Ok(sensors)
        }
    }

    pub mod nvme {
        //! NVMe controllers
        use std::path::Path;

        use crate::error::Result;
        use crate::sys::dir_names;

        /// Device paths for every NVMe controller, e.g. `/dev/nvme0`
        pub fn controllers() -> Result<Vec<String>> {
            controllers_in("/sys/class/nvme")
        }

        pub fn controllers_in<P: AsRef<Path>>(root: P) -> Result<Vec<String>> {
            Ok(dir_names(root.as_ref())?
                .into_iter()
                .filter(|name| {
                    name.len() > 4
                        && name.starts_with("nvme")
                        && name[4..].chars().all(|c| c.is_ascii_digit())
                })
                .map(|name| format!("/dev/{}", name))
                .collect())
        }
    }
}

pub mod apparmor {
    //! AppArmor state, from /sys/module and securityfs
    use std::fmt;
    use std::str::FromStr;

    use crate::error::{CheckError, Result};
    use crate::procfs::read_file;

    /// Whether the AppArmor module is enabled in the running kernel
    pub fn enabled() -> Result<bool> {
        let contents = read_file("/sys/module/apparmor/parameters/enabled")?;
        Ok(contents.trim() == "Y")
    }

    /// A loaded profile and the mode it is in
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Profile {
        pub name: String,
        pub mode: String,
    }

    /// The loaded profiles, needs root to read
    pub fn profiles() -> Result<Vec<Profile>> {
        read_file("/sys/kernel/security/apparmor/profiles")?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.parse::<Profile>())
            .collect()
    }

    /// Split `name (mode)`, where name may itself contain spaces
    fn name_and_mode(s: &str) -> Option<(String, String)> {
        let s = s.trim();
        let open = s.rfind(" (")?;
        let mode = s[open + 2..].strip_suffix(')')?;
        Some((s[..open].to_owned(), mode.to_owned()))
    }

    impl FromStr for Profile {
        type Err = CheckError;

        fn from_str(line: &str) -> Result<Profile> {
            let (name, mode) = name_and_mode(line).ok_or_else(|| {
                CheckError::parse(format!("unexpected apparmor profile line '{}'", line))
            })?;
            Ok(Profile { name, mode })
        }
    }

    /// How a process is confined, parsed from its security label
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Confinement {
        Unconfined,
        Profile { name: String, mode: String },
    }

    impl FromStr for Confinement {
        type Err = CheckError;

        fn from_str(label: &str) -> Result<Confinement> {
            let label = label.trim();
            if label == "unconfined" {
                return Ok(Confinement::Unconfined);
            }
            match name_and_mode(label) {
                Some((_, ref mode)) if mode == "unconfined" => Ok(Confinement::Unconfined),
                Some((name, mode)) => Ok(Confinement::Profile { name, mode }),
                None => Err(CheckError::parse(format!(
                    "unexpected security label '{}'",
                    label
                ))),
            }
        }
    }

    impl fmt::Display for Confinement {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            match self {
                Confinement::Unconfined => f.write_str("unconfined"),
                Confinement::Profile { name, mode } => write!(f, "{} ({})", name, mode),
            }
        }
    }
}

#[cfg(test)]
mod unit {
    use std::fs;

    use super::apparmor::{Confinement, Profile};
    use super::class::{hwmon, nvme};

    #[test]
    fn reads_hwmon_tree() {
        let root = tempfile::tempdir().unwrap();
        let chip = root.path().join("hwmon0");
        fs::create_dir(&chip).unwrap();
        fs::write(chip.join("name"), "coretemp\n").unwrap();
        fs::write(chip.join("temp1_input"), "45000\n").unwrap();
        fs::write(chip.join("temp1_label"), "Package id 0\n").unwrap();
        fs::write(chip.join("temp1_max"), "80000\n").unwrap();
        fs::write(chip.join("temp1_crit"), "100000\n").unwrap();
        fs::write(chip.join("temp10_input"), "51500\n").unwrap();
        fs::write(chip.join("temp2_input"), "garbage\n").unwrap();

        let nolabel = root.path().join("hwmon1");
        fs::create_dir(&nolabel).unwrap();
        fs::write(nolabel.join("temp1_input"), "-5000\n").unwrap();

        let sensors = hwmon::temperatures_in(root.path()).unwrap();
        assert_eq!(
            sensors,
            vec![
                hwmon::Sensor {
                    chip: "coretemp".into(),
                    label: "Package id 0".into(),
                    celsius: 45.0,
                    max: Some(80.0),
                    crit: Some(100.0),
                },
                hwmon::Sensor {
                    chip: "coretemp".into(),
                    label: "temp10".into(),
                    celsius: 51.5,
                    max: None,
                    crit: None,
                },
                hwmon::Sensor {
                    chip: "hwmon1".into(),
                    label: "temp1".into(),
                    celsius: -5.0,
                    max: None,
                    crit: None,
                },
            ]
        );
        assert_eq!(sensors[0].name(), "coretemp/Package id 0");
        assert_eq!(sensors[0].perf_key(), "coretemp_Package_id_0");
    }

    #[test]
    fn lists_nvme_controllers() {
        let root = tempfile::tempdir().unwrap();
        for name in &["nvme1", "nvme0", "nvme-subsys0"] {
            fs::create_dir(root.path().join(name)).unwrap();
        }
        assert_eq!(
            nvme::controllers_in(root.path()).unwrap(),
            ["/dev/nvme0", "/dev/nvme1"]
        );
    }

    #[test]
    fn parses_profiles() {
        let p: Profile = "/usr/sbin/cupsd (enforce)".parse().unwrap();
        assert_eq!(
            p,
            Profile {
                name: "/usr/sbin/cupsd".into(),
                mode: "enforce".into()
            }
        );
        let p: Profile = "snap.some app//hook (complain)\n".parse().unwrap();
        assert_eq!(p.name, "snap.some app//hook");
        assert_eq!(p.mode, "complain");
        assert!("no mode here".parse::<Profile>().is_err());
    }

    #[test]
    fn parses_confinement() {
        assert_eq!(
            "unconfined\n".parse::<Confinement>().unwrap(),
            Confinement::Unconfined
        );
        assert_eq!(
            "/usr/sbin/ntpd (enforce)".parse::<Confinement>().unwrap(),
            Confinement::Profile {
                name: "/usr/sbin/ntpd".into(),
                mode: "enforce".into()
            }
        );
        assert_eq!(
            "firefox (unconfined)".parse::<Confinement>().unwrap(),
            Confinement::Unconfined
        );
    }
}
