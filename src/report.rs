// 📝 Simulation summary - one plain-text file per investor submission

use std::path::{Path, PathBuf};

use crate::allocation::Category;
use crate::records::ClientRecord;

/// `R$ 60,000.00`
pub fn format_brl(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0 { "-" } else { "" };
    format!("R$ {}{}.00", sign, grouped)
}

/// `<name>_<phone>_<email>.txt` with separators flattened to `_`
pub fn summary_file_name(name: &str, phone: &str, email: &str) -> String {
    let flatten = |s: &str, extra: &[char]| -> String {
        s.chars()
            .map(|c| {
                if c == ' ' || c == '/' || c == '\\' || extra.contains(&c) {
                    '_'
                } else {
                    c
                }
            })
            .collect()
    };

    format!(
        "{}_{}_{}.txt",
        flatten(name, &[]),
        flatten(phone, &[]),
        flatten(email, &['@', '.'])
    )
}

pub fn render_summary(record: &ClientRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("Name: {}\n", record.name));
    out.push_str(&format!("Phone: {}\n", record.phone));
    out.push_str(&format!("Email: {}\n", record.email));
    out.push_str(&format!("Investor tier: {}\n", record.tier));
    out.push_str(&format!("Investment amount: {}\n", record.capital_band));
    out.push_str(&format!(
        "Total net worth: {}\n",
        format_brl(record.breakdown.total_net_worth)
    ));
    for category in Category::ALL {
        out.push_str(&format!(
            "{}: {}\n",
            category.label(),
            format_brl(record.breakdown.amount(category))
        ));
    }
    out
}

/// Write the summary under `dir`, creating it if needed
pub fn write_summary(dir: &Path, record: &ClientRecord) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(summary_file_name(&record.name, &record.phone, &record.email));
    std::fs::write(&path, render_summary(record))?;

    tracing::debug!(path = %path.display(), "simulation summary written");
    Ok(path)
}
