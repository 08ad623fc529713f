//! Built-in surfaces
//!
//! The boot screen, both kernel-panel variants and the two contact
//! terminals, written as plain [`SurfaceSpec`]s.

use std::time::Duration;

use crate::gate::GatePolicy;
use crate::playback::TypewriterTiming;
use crate::ramp::RampConfig;
use crate::script::Script;
use crate::sequencer::PhaseSpec;
use crate::surface::{StreamSpec, SurfaceSpec};

/// A named built-in surface.
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    /// Name accepted by `--preset`
    pub name: &'static str,
    /// One-line summary
    pub summary: &'static str,
    build: fn() -> SurfaceSpec,
}

impl Preset {
    /// Builds the preset's surface spec.
    #[must_use]
    pub fn spec(&self) -> SurfaceSpec {
        (self.build)()
    }
}

/// Every built-in preset.
pub const PRESETS: &[Preset] = &[
    Preset {
        name: "boot",
        summary: "Boot log batches, a long pause and a 15 s progress bar",
        build: boot,
    },
    Preset {
        name: "kernel",
        summary: "Kernel log panel with a command stream; plays once when shown",
        build: kernel,
    },
    Preset {
        name: "kernel-loop",
        summary: "Kernel log panel that loops and rewinds after leaving view",
        build: kernel_loop,
    },
    Preset {
        name: "contact",
        summary: "Contact terminal; rewinds after leaving view",
        build: contact,
    },
    Preset {
        name: "transition",
        summary: "Longer hand-off terminal between sections",
        build: transition,
    },
];

/// Looks a preset up by name.
#[must_use]
pub fn find(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|preset| preset.name == name)
}

/// Names of every preset.
pub fn names() -> impl Iterator<Item = &'static str> {
    PRESETS.iter().map(|preset| preset.name)
}

/// Closest preset name for typo correction, within a Damerau-Levenshtein
/// distance of 3.
#[must_use]
pub fn suggest(input: &str) -> Option<&'static str> {
    PRESETS
        .iter()
        .map(|preset| (preset.name, strsim::damerau_levenshtein(input, preset.name)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name)
}

const fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

const TERMINAL_TYPING: TypewriterTiming = TypewriterTiming::new(ms(30), ms(800));

const BOOT_BATCH_1: &[&str] = &[
    "[  0.000000] Initializing system...",
    "[  0.012341] Loading kernel modules...",
    "[  0.045231] ACPI: EC: GPE storm detected, transactions will be delayed.",
    "[  0.078923] USB 1-3: new high-speed USB device number 4 using xhci_hcd",
    "[  0.112341] systemd[1]: Started Session c1 of user root.",
    "[  0.145892] GPU0: Initializing CUDA driver...",
    "[  0.178234] MLIR: Registering JIT backend...",
    "[  0.212456] Triton: Kernel optimizer loaded.",
    "[  0.245678] systemd[1]: Mounting /sys/kernel/debug...",
    "[  0.278901] ACPI: PCI Interrupt Link [LNKA] (IRQs 3 4 5 6 7 10 11 12 14 15) *0",
    "[  0.312123] pci 0000:00:1f.3: [8086:02c8] type 00 class 0x040380",
    "[  0.345456] systemd[1]: Started Load Kernel Modules.",
    "[  0.378789] systemd[1]: Started Remount Root and Kernel File Systems.",
    "[  0.412012] systemd[1]: Mounted Kernel Debug File System.",
    "[  0.445345] systemd[1]: Started Create System Users.",
];

const BOOT_BATCH_2: &[&str] = &[
    "[  0.645333] systemd[1]: Started Coldplug All udev Devices.",
    "[  0.678666] systemd[1]: Started Load/Save Random Seed.",
    "[  0.712000] systemd[1]: Started Network Time Synchronization.",
    "[  0.745333] systemd[1]: Started Network Manager.",
    "[  0.778666] systemd[1]: Started Display Manager.",
    "[  0.812000] GPU0: CUDA driver initialized successfully.",
    "[  0.845333] MLIR: JIT backend ready for compilation.",
    "[  0.878666] Triton: Kernel fusion optimizer active.",
    "[  0.912000] [  OK  ] System boot complete.",
    "[  0.945333] Starting UI renderer...",
];

const KERNEL_LOGS: &[&str] = &[
    "[INFO] Compiling CUDA kernel: matrix_multiply_v2",
    "[INFO] Launch parameters: <<<256, 1024>>>",
    "[INFO] Memory transfer: Host → Device (2048 MB)",
    "[INFO] Kernel execution: 0.0234s",
    "[INFO] Memory transfer: Device → Host (2048 MB)",
    "[INFO] Throughput: 87.4 GFLOPS",
    "[INFO] GPU utilization: 94.2%",
    "[INFO] Model forward pass: 12.3ms",
    "[INFO] Model backward pass: 18.7ms",
    "[INFO] Optimizer step: 2.1ms",
];

const KERNEL_COMMANDS: &[&str] = &[
    "$ nvcc -O3 -arch=sm_86 matrix_multiply_v2.cu -o mm",
    "$ ./mm --bench --iterations 100",
    "[OK] Kernel verified against reference.",
];

const CONTACT_LINES: &[&str] = &[
    "[INFO] Exporting experience logs...",
    "[INFO] Establishing secure connection...",
    "[OK] System ready for contact.",
    "",
    "$ connecting to contact.space...",
    "[SUCCESS] Connection established.",
    "",
    ">>> Entering contact space <<<",
];

const TRANSITION_LINES: &[&str] = &[
    "[INFO] Execution trace compilation complete.",
    "[INFO] Exporting experience logs...",
    "[INFO] Establishing secure connection...",
    "[INFO] Preparing contact interface...",
    "[INFO] Initializing communication protocols...",
    "[OK] System ready for contact.",
    "",
    "$ connecting to contact.space...",
    "$ establishing handshake...",
    "[SUCCESS] Connection established.",
    "",
    ">>> Entering contact space <<<",
];

fn boot() -> SurfaceSpec {
    let log_lines = TypewriterTiming::new(ms(80), Duration::ZERO).by_line();
    SurfaceSpec {
        name: "boot".into(),
        gate: None,
        streams: vec![StreamSpec::new(
            "boot",
            vec![
                PhaseSpec::showing("init", Script::new(BOOT_BATCH_1[..1].iter().copied()), ms(300)),
                PhaseSpec::typing("batch1", Script::new(BOOT_BATCH_1[1..].iter().copied()), log_lines),
                PhaseSpec::waiting("ellipsis", ms(500)),
                PhaseSpec::typing("batch2", Script::new(BOOT_BATCH_2.iter().copied()), log_lines),
                PhaseSpec::waiting("long_delay", Duration::from_secs(5)),
                PhaseSpec::ramping("loading", RampConfig::default()),
                PhaseSpec::waiting("settle", ms(300)),
                PhaseSpec::waiting("fade", ms(300)),
            ],
        )],
    }
}

fn kernel() -> SurfaceSpec {
    SurfaceSpec {
        name: "kernel".into(),
        gate: Some(GatePolicy::OnceOnly),
        streams: vec![
            StreamSpec::new(
                "kernel",
                vec![PhaseSpec::typing(
                    "logs",
                    Script::new(KERNEL_LOGS.iter().copied()),
                    TypewriterTiming::new(ms(30), ms(2_000)),
                )],
            ),
            StreamSpec::new(
                "commands",
                vec![PhaseSpec::typing(
                    "commands",
                    Script::new(KERNEL_COMMANDS.iter().copied()),
                    TERMINAL_TYPING,
                )],
            )
            .after("kernel"),
        ],
    }
}

fn kernel_loop() -> SurfaceSpec {
    SurfaceSpec {
        name: "kernel-loop".into(),
        gate: Some(GatePolicy::RESTART),
        streams: vec![StreamSpec::new(
            "kernel",
            vec![PhaseSpec::typing(
                "logs",
                Script::new(KERNEL_LOGS.iter().copied()),
                TypewriterTiming::new(ms(30), ms(2_000)).repeating(),
            )],
        )],
    }
}

fn terminal(name: &str, lines: &[&str]) -> SurfaceSpec {
    SurfaceSpec {
        name: name.into(),
        gate: Some(GatePolicy::RESTART),
        streams: vec![StreamSpec::new(
            "terminal",
            vec![PhaseSpec::typing(
                "typing",
                Script::new(lines.iter().copied()),
                TERMINAL_TYPING.with_empty_line_delay(ms(200)),
            )],
        )],
    }
}

fn contact() -> SurfaceSpec {
    terminal("contact", CONTACT_LINES)
}

fn transition() -> SurfaceSpec {
    terminal("transition", TRANSITION_LINES)
}
