use std::path::Path;

use crate::error::Result;

/// Renders train and validation loss per epoch as a standalone SVG document.
///
/// The validation curve is dashed and only drawn when it has one point per
/// epoch. Fewer than two epochs produce a placeholder note.
pub fn render_loss_curve(train_loss: &[f64], val_loss: &[f64]) -> String {
    let w = 760.0f64;
    let h = 220.0f64;
    let pad_l = 60.0f64;
    let pad_r = 16.0f64;
    let pad_t = 16.0f64;
    let pad_b = 30.0f64;

    let n = train_loss.len();
    if n < 2 {
        return format!(
            "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n\
             <text x=\"{}\" y=\"{}\" fill=\"#999\" font-size=\"12\">Not enough epochs to draw a curve.</text>\n\
             </svg>\n",
            w, h, pad_l, h / 2.0
        );
    }

    let finite = |v: &&f64| v.is_finite();
    let max_y = train_loss.iter().chain(val_loss.iter()).filter(finite).cloned().fold(0.0f64, f64::max) * 1.05;
    let min_y = 0.0f64;

    let px = |i: usize, v: f64| -> (f64, f64) {
        let x = pad_l + (i as f64 / (n - 1) as f64) * (w - pad_l - pad_r);
        let v = if v.is_finite() { v } else { max_y };
        let y = pad_t + (max_y - v) / (max_y - min_y + 1e-12) * (h - pad_t - pad_b);
        (x, y)
    };
    let path = |points: &[f64]| -> String {
        points.iter().enumerate().map(|(i, &v)| {
            let (x, y) = px(i, v);
            if i == 0 { format!("M{:.1},{:.1}", x, y) } else { format!(" L{:.1},{:.1}", x, y) }
        }).collect()
    };

    let train_path = path(train_loss);
    let val_path = if val_loss.len() == n { path(val_loss) } else { String::new() };

    let grey_grid = "#f0f2f5";
    let grey_text = "#999";
    let y_labels: String = (0..=4).map(|g| {
        let frac = g as f64 / 4.0;
        let val  = min_y + (max_y - min_y) * frac;
        let y    = pad_t + (1.0 - frac) * (h - pad_t - pad_b);
        format!(
            "<text x=\"{}\" y=\"{:.1}\" text-anchor=\"end\" fill=\"{}\" font-size=\"10\">{:.3}</text>\n\
             <line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"1\"/>",
            pad_l - 4.0, y + 4.0, grey_text, val,
            pad_l, y, w - pad_r, y, grey_grid
        )
    }).collect::<Vec<_>>().join("\n");

    let x_labels: String = [0, n / 2, n - 1].iter().map(|&i| {
        let (x, _) = px(i, 0.0);
        format!(
            "<text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" fill=\"{}\" font-size=\"10\">{}</text>",
            x, h - 4.0, grey_text, i + 1
        )
    }).collect::<Vec<_>>().join("\n");

    let blue_dark = "#1e40af";
    let red_dark  = "#dc2626";
    let dark_text = "#333";

    let (val_line, val_legend) = if val_path.is_empty() {
        (String::new(), String::new())
    } else {
        (
            format!(
                "<path d=\"{}\" stroke=\"{}\" stroke-width=\"1.5\" fill=\"none\" stroke-dasharray=\"5,4\"/>",
                val_path, blue_dark
            ),
            format!(
                "<line x1=\"{:.1}\" y1=\"9\" x2=\"{:.1}\" y2=\"9\" stroke=\"{}\" stroke-width=\"1.5\" stroke-dasharray=\"4,3\"/>\n\
                 <text x=\"{:.1}\" y=\"13\" fill=\"{}\" font-size=\"10\">val loss</text>",
                pad_l + 90.0, pad_l + 108.0, blue_dark, pad_l + 112.0, dark_text
            ),
        )
    };

    format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n\
         {}\n{}\n\
         <path d=\"{}\" stroke=\"{}\" stroke-width=\"2\" fill=\"none\"/>\n\
         {}\n\
         <rect x=\"{:.1}\" y=\"4\" width=\"18\" height=\"4\" fill=\"{}\"/>\n\
         <text x=\"{:.1}\" y=\"13\" fill=\"{}\" font-size=\"10\">train loss</text>\n\
         {}\n\
         </svg>\n",
        w, h,
        y_labels, x_labels,
        train_path, red_dark,
        val_line,
        pad_l, red_dark,
        pad_l + 22.0, dark_text,
        val_legend,
    )
}

/// Writes `render_loss_curve` output to `path`, creating parent directories.
pub fn save_loss_curve(path: impl AsRef<Path>, train_loss: &[f64], val_loss: &[f64]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_loss_curve(train_loss, val_loss))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_both_curves() {
        let svg = render_loss_curve(&[3.0, 2.0, 1.0], &[3.5, 2.5, 2.0]);
        assert!(svg.starts_with("<svg"));
        assert_eq!(svg.matches("<path").count(), 2);
        assert!(svg.contains("val loss"));
    }

    #[test]
    fn mismatched_validation_curve_is_skipped() {
        let svg = render_loss_curve(&[3.0, 2.0], &[1.0]);
        assert_eq!(svg.matches("<path").count(), 1);
    }

    #[test]
    fn single_epoch_renders_a_note() {
        assert!(render_loss_curve(&[1.0], &[1.0]).contains("Not enough epochs"));
    }
}
