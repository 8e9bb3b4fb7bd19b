use quad_core::SynthConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub run_seconds: Option<u64>,
    pub sample_interval_ms: u32,
    pub poll_interval_ms: u64,
    pub channel_capacity: usize,
    pub enc1_rate: i64,
    pub enc2_rate: i64,
    pub reverse_every_ms: Option<u64>,
    pub feed_period_ms: u64,
    pub fail_encoder: Option<u8>,
    pub json_logs: bool,
    pub metrics_addr: Option<String>,
    pub audit_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let synth = SynthConfig::default();
        Self {
            show_help: false,
            run_seconds: None,
            sample_interval_ms: synth.sample_interval_ms,
            poll_interval_ms: synth.poll_interval.as_millis() as u64,
            channel_capacity: synth.channel_capacity,
            enc1_rate: 0,
            enc2_rate: 0,
            reverse_every_ms: None,
            feed_period_ms: 1,
            fail_encoder: None,
            json_logs: false,
            metrics_addr: None,
            audit_path: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Self {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--run-seconds" => {
                    if i + 1 < args.len() {
                        cfg.run_seconds = args[i + 1].parse::<u64>().ok();
                        i += 1;
                    }
                }
                "--sample-interval-ms" => {
                    if i + 1 < args.len() {
                        cfg.sample_interval_ms =
                            args[i + 1].parse().unwrap_or(cfg.sample_interval_ms);
                        i += 1;
                    }
                }
                "--poll-interval-ms" => {
                    if i + 1 < args.len() {
                        cfg.poll_interval_ms = args[i + 1].parse().unwrap_or(cfg.poll_interval_ms);
                        i += 1;
                    }
                }
                "--channel-capacity" => {
                    if i + 1 < args.len() {
                        cfg.channel_capacity = args[i + 1].parse().unwrap_or(cfg.channel_capacity);
                        i += 1;
                    }
                }
                "--enc1-rate" => {
                    if i + 1 < args.len() {
                        cfg.enc1_rate = args[i + 1].parse().unwrap_or(0);
                        i += 1;
                    }
                }
                "--enc2-rate" => {
                    if i + 1 < args.len() {
                        cfg.enc2_rate = args[i + 1].parse().unwrap_or(0);
                        i += 1;
                    }
                }
                "--reverse-every-ms" => {
                    if i + 1 < args.len() {
                        cfg.reverse_every_ms =
                            args[i + 1].parse::<u64>().ok().filter(|ms| *ms > 0);
                        i += 1;
                    }
                }
                "--feed-period-ms" => {
                    if i + 1 < args.len() {
                        cfg.feed_period_ms = args[i + 1]
                            .parse::<u64>()
                            .ok()
                            .filter(|ms| *ms > 0)
                            .unwrap_or(cfg.feed_period_ms);
                        i += 1;
                    }
                }
                "--fail-encoder" => {
                    if i + 1 < args.len() {
                        cfg.fail_encoder = args[i + 1].parse::<u8>().ok().filter(|ch| *ch <= 1);
                        i += 1;
                    }
                }
                "--json-logs" => {
                    cfg.json_logs = true;
                }
                "--metrics-addr" => {
                    if i + 1 < args.len() {
                        cfg.metrics_addr = Some(args[i + 1].clone());
                        i += 1;
                    }
                }
                "--audit-log" => {
                    if i + 1 < args.len() {
                        cfg.audit_path = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
                }
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                _ => {}
            }
            i += 1;
        }
        cfg
    }

    pub fn synth_config(&self) -> SynthConfig {
        SynthConfig {
            sample_interval_ms: self.sample_interval_ms,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            channel_capacity: self.channel_capacity,
        }
    }

    pub fn print_help() {
        println!(
            r#"quad-bridge - Merge two rotary encoders into one quadrature output

USAGE:
    quad-bridge [OPTIONS]

OPTIONS:
    --run-seconds <SECS>        Run for a fixed duration then exit
    --sample-interval-ms <MS>   Minimum time between encoder samples [default: 10]
    --poll-interval-ms <MS>     Pause between sampler checks [default: 1]
    --channel-capacity <N>      Step events buffered before the sampler blocks [default: 32]
    --enc1-rate <TICKS/S>       Simulated rate of encoder 1, signed [default: 0]
    --enc2-rate <TICKS/S>       Simulated rate of encoder 2, signed [default: 0]
    --reverse-every-ms <MS>     Reverse both simulated encoders on this period
    --feed-period-ms <MS>       Update period of the simulated encoders [default: 1]
    --fail-encoder <0|1>        Make the given encoder fail initialization
    --json-logs                 Output logs in JSON format (for log aggregation)
    --metrics-addr <ADDR>       Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    --audit-log <PATH>          Append lifecycle events to the given JSONL file
    -h, --help                  Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                    Set log filter (e.g., RUST_LOG=debug,quad_core=trace)

EXAMPLES:
    # Two encoders turning against each other
    quad-bridge --enc1-rate 400 --enc2-rate -150 --metrics-addr 0.0.0.0:9090

    # Short test run
    quad-bridge --run-seconds 5 --enc1-rate 100 --reverse-every-ms 1000
"#
        );
    }
}
