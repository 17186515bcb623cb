use morphon::rules::demo;
use morphon::{RunDetails, TraceEvent};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub fn print_run(action: &str, input: &str, forms: &[String], details: &RunDetails, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  {action}: \"{input}\""), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Rules ━━━", ansi::GRAY));
    print_rules(details, &palette);

    if !details.trace.is_empty() {
        println!("\n{}", palette.paint("━━━ Trace ━━━", ansi::GRAY));
        print_trace(&details.trace, &palette);
    }

    println!("\n{}", palette.paint("━━━ Results ━━━", ansi::GRAY));
    if forms.is_empty() {
        println!("{}", palette.dim("  No forms produced"));
        println!("\n{}", palette.paint("Possible reasons:", ansi::YELLOW));
        println!("  • Every candidate failed its allomorph environment");
        println!("  • A blocker vetoed the affixed forms");
        println!("\n{}", palette.dim("  Tip: Set MORPHON_DEBUG_RULES=1 to see rule gating details"));
    } else {
        for (idx, form) in forms.iter().enumerate() {
            println!("  {} {}", palette.paint(format!("[{idx}]"), ansi::GRAY), palette.bold(palette.paint(form, ansi::GREEN)));
        }
    }

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!(
        "  Total: {}  │  Rules: {}  │  Resolve: {}",
        palette.paint(format!("{:?}", details.total), ansi::GREEN),
        palette.paint(format!("{:?}", details.rules_total), ansi::CYAN),
        palette.dim(format!("{:?}", details.resolve)),
    );
    println!();
}

fn print_rules(details: &RunDetails, palette: &ansi::Palette) {
    for rule in &details.rules {
        let active = details.active_rules.iter().any(|r| r == &rule.rule);
        let label = palette.paint(format!("{:<20}", rule.rule), if active { ansi::BLUE } else { ansi::GRAY });
        let outcome = if rule.applied > 0 {
            palette.paint(format!("✓ {}/{} applied", rule.applied, rule.attempted), ansi::GREEN)
        } else {
            palette.dim(format!("✗ 0/{} applied", rule.attempted))
        };
        println!(
            "  {} {}  {} {}  {}",
            label,
            outcome,
            palette.dim("candidates:"),
            palette.paint(rule.candidates.to_string(), ansi::YELLOW),
            palette.dim(format!("{:?}", rule.duration)),
        );
    }
}

fn print_trace(events: &[TraceEvent], palette: &ansi::Palette) {
    for event in events.iter().take(20) {
        println!("    {}", fmt_event(event, palette));
    }
    if events.len() > 20 {
        println!("    {}", palette.dim(format!("... +{} more", events.len() - 20)));
    }
}

fn fmt_event(event: &TraceEvent, palette: &ansi::Palette) -> String {
    let inventory = demo::inventory();
    let output = match &event.output {
        Some(shape) => palette.paint(inventory.render(shape), ansi::GREEN),
        None => palette.dim("vetoed"),
    };
    let allomorph = event.allomorph.as_deref().map(|a| format!(" ({a})")).unwrap_or_default();
    format!(
        "{}{} {} {} {}",
        palette.paint(&event.rule, ansi::BLUE),
        palette.dim(allomorph),
        palette.paint(inventory.render(&event.input), ansi::YELLOW),
        palette.dim("→"),
        output
    )
}
