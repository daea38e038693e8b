//! CSV and PDF renderers for dashboard downloads.

/// Renders a header row followed by `rows` as CSV.
pub fn to_csv<R, S>(headers: &[&str], rows: R) -> Result<Vec<u8>, csv::Error>
where
    R: IntoIterator<Item = Vec<S>>,
    S: AsRef<[u8]>,
{
    let mut wtr = csv::WriterBuilder::new().from_writer(vec![]);
    wtr.write_record(headers)?;
    for row in rows {
        wtr.write_record(&row)?;
    }
    wtr.into_inner().map_err(|e| e.into_error().into())
}

const PAGE_WIDTH: f64 = 612.0;
const PAGE_HEIGHT: f64 = 792.0;
const MARGIN: f64 = 50.0;
const LINE_HEIGHT_FACTOR: f64 = 1.4;

struct PdfLine {
    text: String,
    font_size: f64,
    bold: bool,
}

/// Minimal multi-page PDF 1.4 writer using the built-in Helvetica fonts.
pub struct SimplePdf {
    lines: Vec<PdfLine>,
}

impl Default for SimplePdf {
    fn default() -> Self {
        Self::new()
    }
}

impl SimplePdf {
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.push(text, 16.0, true);
        self.blank()
    }

    pub fn heading(&mut self, text: &str) -> &mut Self {
        self.push(text, 11.0, true)
    }

    pub fn text(&mut self, text: &str) -> &mut Self {
        self.push(text, 10.0, false)
    }

    pub fn blank(&mut self) -> &mut Self {
        self.push("", 10.0, false)
    }

    /// A header row in bold followed by one line per row, cells separated by " | ".
    pub fn table<R, S>(&mut self, headers: &[&str], rows: R) -> &mut Self
    where
        R: IntoIterator<Item = Vec<S>>,
        S: AsRef<str>,
    {
        self.push(&headers.join(" | "), 10.0, true);
        for row in rows {
            let cells: Vec<&str> = row.iter().map(|c| c.as_ref()).collect();
            self.push(&cells.join(" | "), 9.0, false);
        }
        self
    }

    fn push(&mut self, text: &str, font_size: f64, bold: bool) -> &mut Self {
        // Helvetica averages about half an em per glyph.
        let max_chars = ((PAGE_WIDTH - 2.0 * MARGIN) / (font_size * 0.5)) as usize;
        if text.chars().count() <= max_chars {
            self.lines.push(PdfLine {
                text: text.to_string(),
                font_size,
                bold,
            });
            return self;
        }
        let chars: Vec<char> = text.chars().collect();
        for chunk in chars.chunks(max_chars) {
            self.lines.push(PdfLine {
                text: chunk.iter().collect(),
                font_size,
                bold,
            });
        }
        self
    }

    /// PDF string literal body in WinAnsiEncoding. Latin-1 letters become
    /// octal escapes; anything the encoding can't show becomes '?'.
    fn escape(s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '\\' | '(' | ')' => {
                    out.push('\\');
                    out.push(c);
                }
                ' '..='~' => out.push(c),
                '\u{A0}'..='\u{FF}' => out.push_str(&format!("\\{:03o}", c as u32)),
                _ => out.push('?'),
            }
        }
        out
    }

    fn paginate(&self) -> Vec<String> {
        let mut pages = Vec::new();
        let mut stream = String::new();
        let mut y = PAGE_HEIGHT - MARGIN;

        for line in &self.lines {
            let step = line.font_size * LINE_HEIGHT_FACTOR;
            if y - step < MARGIN {
                pages.push(std::mem::take(&mut stream));
                y = PAGE_HEIGHT - MARGIN;
            }
            y -= step;
            if line.text.is_empty() {
                continue;
            }
            let font = if line.bold { "F2" } else { "F1" };
            stream.push_str(&format!(
                "BT /{} {:.1} Tf {:.1} {:.1} Td ({}) Tj ET\n",
                font,
                line.font_size,
                MARGIN,
                y,
                Self::escape(&line.text)
            ));
        }
        pages.push(stream);
        pages
    }

    pub fn render(&self) -> Vec<u8> {
        let pages = self.paginate();
        let mut buf: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = Vec::new();

        buf.extend_from_slice(b"%PDF-1.4\n");
        buf.extend_from_slice(&[b'%', 0xE2, 0xE3, 0xCF, 0xD3, b'\n']);

        let page_obj = |i: usize| 5 + 2 * i;
        let kids: Vec<String> = (0..pages.len()).map(|i| format!("{} 0 R", page_obj(i))).collect();

        let mut objects: Vec<String> = vec![
            "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
            format!(
                "<< /Type /Pages /Kids [{}] /Count {} >>",
                kids.join(" "),
                pages.len()
            ),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_string(),
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>".to_string(),
        ];
        for (i, content) in pages.iter().enumerate() {
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
                 /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
                PAGE_WIDTH,
                PAGE_HEIGHT,
                page_obj(i) + 1
            ));
            objects.push(format!(
                "<< /Length {} >>\nstream\n{}endstream",
                content.len(),
                content
            ));
        }

        for (i, body) in objects.iter().enumerate() {
            offsets.push(buf.len());
            buf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }

        let xref_start = buf.len();
        buf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
        buf.extend_from_slice(b"0000000000 65535 f \n");
        for off in &offsets {
            buf.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        buf.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_start
            )
            .as_bytes(),
        );
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_quotes_commas_and_quotes() {
        let bytes = to_csv(
            &["Student", "Rating", "Comment"],
            vec![vec!["Asha", "5", "clear, \"confident\""]],
        )
        .unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "Student,Rating,Comment\nAsha,5,\"clear, \"\"confident\"\"\"\n"
        );
    }

    #[test]
    fn pdf_has_header_and_trailer() {
        let mut pdf = SimplePdf::new();
        pdf.title("Activity Log")
            .table(&["Role", "Action"], vec![vec!["FACULTY", "Assigned a task (p1)"]]);
        let bytes = pdf.render();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.contains("(FACULTY | Assigned a task \\(p1\\)) Tj"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn long_documents_span_pages() {
        let mut pdf = SimplePdf::new();
        for i in 0..150 {
            pdf.text(&format!("line {}", i));
        }
        let text = String::from_utf8_lossy(&pdf.render()).to_string();
        assert!(text.contains("/Count 4"));
    }

    #[test]
    fn latin_names_survive_in_win_ansi() {
        let mut pdf = SimplePdf::new();
        pdf.heading("Zoë Ñúñez").text("नमस्ते Asha");
        let text = String::from_utf8_lossy(&pdf.render()).to_string();
        assert!(text.contains("/BaseFont /Helvetica /Encoding /WinAnsiEncoding"));
        assert!(text.contains("/F2 11.0 Tf"));
        assert!(text.contains("(Zo\\353 \\321\\372\\361ez) Tj"));
        assert!(text.contains("(?????? Asha) Tj"));
    }
}
