use crate::types::{DisplayMode, Reading};

/// One repaint of the character display: clear everything, then write
/// `text` starting at column 0 of `row`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFrame {
    pub row: u8,
    pub text: String,
}

/// Decides once per scheduler tick whether the display needs a repaint and
/// what it should show. Owns the scroll cursor and the repaint gate; time
/// is injected so the engine stays clock-free and testable.
#[derive(Debug)]
pub struct DisplayEngine {
    mode: DisplayMode,
    scroll_offset: usize,
    last_refresh_s: Option<u64>,
    window_cols: usize,
    refresh_interval_s: u64,
}

impl DisplayEngine {
    pub fn new(window_cols: usize, refresh_interval_s: u64) -> Self {
        Self {
            mode: DisplayMode::Idle,
            scroll_offset: 0,
            last_refresh_s: None,
            window_cols,
            refresh_interval_s,
        }
    }

    pub fn mode(&self) -> &DisplayMode {
        &self.mode
    }

    /// Replaces the active mode. The scroll cursor and the repaint gate are
    /// reset so the new content appears on the very next tick instead of
    /// waiting out the old mode's gate.
    pub fn set_mode(&mut self, mode: DisplayMode) {
        self.mode = mode;
        self.scroll_offset = 0;
        self.last_refresh_s = None;
    }

    /// True when the temperature mode is about to repaint. The scheduler
    /// re-samples the climate sensor first, so the painted value is taken
    /// at repaint time rather than at the top of the iteration.
    pub fn wants_climate_resample(&self, now_s: u64) -> bool {
        self.mode == DisplayMode::Temperature && self.refresh_due(now_s)
    }

    pub fn tick(
        &mut self,
        now_s: u64,
        distance: &Reading,
        temperature: &Reading,
    ) -> Option<RenderFrame> {
        match &self.mode {
            DisplayMode::Idle => None,
            DisplayMode::Distance => {
                if !self.refresh_due(now_s) {
                    return None;
                }
                let text = match distance {
                    Reading::NoEcho => "Dist: -- cm".to_string(),
                    other => format!("Dist:{}cm", other.as_str()),
                };
                self.last_refresh_s = Some(now_s);
                Some(RenderFrame { row: 0, text })
            }
            DisplayMode::Temperature => {
                if !self.refresh_due(now_s) {
                    return None;
                }
                // Second line, to tell this mode apart at a glance.
                let text = format!("Temp:{}C", temperature.as_str());
                self.last_refresh_s = Some(now_s);
                Some(RenderFrame { row: 1, text })
            }
            DisplayMode::Text(content) => {
                let chars: Vec<char> = content.chars().collect();

                if chars.len() <= self.window_cols {
                    self.scroll_offset = 0;
                    let text = chars.into_iter().collect();
                    return Some(RenderFrame { row: 0, text });
                }

                // Marquee: wrap before slicing, advance one column per
                // tick. Scroll speed is tied to the loop period on purpose.
                if self.scroll_offset > chars.len() - self.window_cols {
                    self.scroll_offset = 0;
                }
                let text: String = chars[self.scroll_offset..self.scroll_offset + self.window_cols]
                    .iter()
                    .collect();
                self.scroll_offset += 1;
                Some(RenderFrame { row: 0, text })
            }
        }
    }

    fn refresh_due(&self, now_s: u64) -> bool {
        self.last_refresh_s
            .map(|last| now_s.saturating_sub(last) >= self.refresh_interval_s)
            .unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn engine() -> DisplayEngine {
        DisplayEngine::new(16, 2)
    }

    fn frame(row: u8, text: &str) -> Option<RenderFrame> {
        Some(RenderFrame {
            row,
            text: text.to_string(),
        })
    }

    #[test]
    fn idle_never_renders() {
        let mut engine = engine();
        for now in 0..10 {
            assert_eq!(engine.tick(now, &Reading::Unavailable, &Reading::Unavailable), None);
        }
    }

    #[test]
    fn distance_respects_refresh_gate() {
        let mut engine = engine();
        engine.set_mode(DisplayMode::Distance);
        let distance = Reading::Value("34.3".into());

        assert_eq!(engine.tick(10, &distance, &Reading::Unavailable), frame(0, "Dist:34.3cm"));
        assert_eq!(engine.tick(10, &distance, &Reading::Unavailable), None);
        assert_eq!(engine.tick(11, &distance, &Reading::Unavailable), None);
        assert_eq!(engine.tick(12, &distance, &Reading::Unavailable), frame(0, "Dist:34.3cm"));
    }

    #[test]
    fn missing_echo_renders_placeholder() {
        let mut engine = engine();
        engine.set_mode(DisplayMode::Distance);
        assert_eq!(
            engine.tick(0, &Reading::NoEcho, &Reading::Unavailable),
            frame(0, "Dist: -- cm")
        );
    }

    #[test]
    fn temperature_renders_on_second_row_and_gates() {
        let mut engine = engine();
        engine.set_mode(DisplayMode::Temperature);
        let temperature = Reading::Value("21.50".into());

        assert_eq!(
            engine.tick(5, &Reading::Unavailable, &temperature),
            frame(1, "Temp:21.50C")
        );
        assert_eq!(engine.tick(6, &Reading::Unavailable, &temperature), None);
        assert_eq!(
            engine.tick(7, &Reading::Unavailable, &temperature),
            frame(1, "Temp:21.50C")
        );
    }

    #[test]
    fn switching_modes_resets_the_gate() {
        let mut engine = engine();
        engine.set_mode(DisplayMode::Distance);
        let distance = Reading::Value("10.0".into());
        let temperature = Reading::Value("21.50".into());

        assert!(engine.tick(10, &distance, &temperature).is_some());
        // Still inside the old gate window; the new mode paints anyway.
        engine.set_mode(DisplayMode::Temperature);
        assert_eq!(engine.tick(10, &distance, &temperature), frame(1, "Temp:21.50C"));
    }

    #[test]
    fn resample_requested_only_when_temperature_repaints() {
        let mut engine = engine();
        assert!(!engine.wants_climate_resample(0));

        engine.set_mode(DisplayMode::Distance);
        assert!(!engine.wants_climate_resample(0));

        engine.set_mode(DisplayMode::Temperature);
        assert!(engine.wants_climate_resample(0));
        let _ = engine.tick(0, &Reading::Unavailable, &Reading::Error);
        assert!(!engine.wants_climate_resample(1));
        assert!(engine.wants_climate_resample(2));
    }

    #[test]
    fn short_text_renders_unscrolled_every_tick() {
        let mut engine = engine();
        engine.set_mode(DisplayMode::Text("Hello World".into()));

        for now in 0..4 {
            assert_eq!(
                engine.tick(now, &Reading::Unavailable, &Reading::Unavailable),
                frame(0, "Hello World")
            );
        }
    }

    #[test]
    fn exact_window_width_does_not_scroll() {
        let mut engine = engine();
        engine.set_mode(DisplayMode::Text("ABCDEFGHIJKLMNOP".into()));

        for now in 0..3 {
            assert_eq!(
                engine.tick(now, &Reading::Unavailable, &Reading::Unavailable),
                frame(0, "ABCDEFGHIJKLMNOP")
            );
        }
    }

    #[test]
    fn long_text_cycles_every_window_then_wraps() {
        let mut engine = engine();
        // 20 chars: windows start at offsets 0..=4, then wrap.
        engine.set_mode(DisplayMode::Text("ABCDEFGHIJKLMNOPQRST".into()));

        let mut seen = Vec::new();
        for now in 0..6 {
            let frame = engine
                .tick(now, &Reading::Unavailable, &Reading::Unavailable)
                .expect("text mode renders every tick");
            assert_eq!(frame.row, 0);
            seen.push(frame.text);
        }

        assert_eq!(
            seen,
            vec![
                "ABCDEFGHIJKLMNOP",
                "BCDEFGHIJKLMNOPQ",
                "CDEFGHIJKLMNOPQR",
                "DEFGHIJKLMNOPQRS",
                "EFGHIJKLMNOPQRST",
                "ABCDEFGHIJKLMNOP",
            ]
        );
    }

    #[test]
    fn wrap_happens_exactly_past_the_last_window() {
        let mut engine = engine();
        // 17 chars: only offsets 0 and 1 are valid windows.
        engine.set_mode(DisplayMode::Text("ABCDEFGHIJKLMNOPQ".into()));

        let texts: Vec<String> = (0..4)
            .map(|now| {
                engine
                    .tick(now, &Reading::Unavailable, &Reading::Unavailable)
                    .expect("text mode renders every tick")
                    .text
            })
            .collect();

        assert_eq!(
            texts,
            vec![
                "ABCDEFGHIJKLMNOP",
                "BCDEFGHIJKLMNOPQ",
                "ABCDEFGHIJKLMNOP",
                "BCDEFGHIJKLMNOPQ",
            ]
        );
    }

    #[test]
    fn new_text_restarts_the_scroll() {
        let mut engine = engine();
        engine.set_mode(DisplayMode::Text("ABCDEFGHIJKLMNOPQRST".into()));
        let _ = engine.tick(0, &Reading::Unavailable, &Reading::Unavailable);
        let _ = engine.tick(1, &Reading::Unavailable, &Reading::Unavailable);

        engine.set_mode(DisplayMode::Text("ABCDEFGHIJKLMNOPQRST".into()));
        assert_eq!(
            engine.tick(2, &Reading::Unavailable, &Reading::Unavailable),
            frame(0, "ABCDEFGHIJKLMNOP")
        );
    }
}
