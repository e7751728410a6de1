//! Turns page content into frames.
//!
//! [`FrameRenderer`] knows the panel geometry and the fonts. It does no
//! scheduling: the scroll task asks it for a [`RenderPlan`] once and then for
//! one frame per scroll offset.

use embedded_graphics::{
    mono_font::{
        MonoFont, MonoTextStyle,
        iso_8859_1::{FONT_6X10, FONT_7X13_BOLD},
    },
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::{Baseline, Text, renderer::TextRenderer},
};

use crate::frame::Frame;
use crate::page::PageContent;

/// Height of the scroll strip, one line of the small font.
pub const STRIP_HEIGHT: u32 = 10;

const SMALL_FONT: &MonoFont<'static> = &FONT_6X10;
const LARGE_FONT: &MonoFont<'static> = &FONT_7X13_BOLD;

/// Which font a line is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontSize {
    /// 6x10, used for everything below the header.
    Small,
    /// 7x13 bold, used for the header.
    Large,
}

impl FontSize {
    fn style(self) -> MonoTextStyle<'static, BinaryColor> {
        match self {
            FontSize::Small => MonoTextStyle::new(SMALL_FONT, BinaryColor::On),
            FontSize::Large => MonoTextStyle::new(LARGE_FONT, BinaryColor::On),
        }
    }
}

/// One line of text at a fixed vertical position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    /// The text itself.
    pub text: String,
    /// Top of the line in pixels.
    pub y: i32,
    /// Font the line is drawn in.
    pub font: FontSize,
}

impl TextLine {
    fn new(text: impl Into<String>, y: i32, font: FontSize) -> Self {
        Self {
            text: text.into(),
            y,
            font,
        }
    }
}

/// Text placement of a page before rasterisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLayout {
    /// Centered header in the large font.
    pub header: TextLine,
    /// Centered secondary lines in the small font.
    pub lines: Vec<TextLine>,
    /// The primary line, which scrolls when it is too wide.
    pub content: Option<TextLine>,
}

/// How a page is put on screen.
#[derive(Debug, Clone)]
pub enum RenderPlan {
    /// Everything fits; draw this frame once.
    Static(Frame),
    /// The content line is wider than the panel.
    Scrolling(ScrollPlan),
}

/// A pre-rendered base frame plus an off-panel strip holding the content line.
#[derive(Debug, Clone)]
pub struct ScrollPlan {
    base: Frame,
    strip: Frame,
    y: i32,
}

impl ScrollPlan {
    /// Number of distinct offsets in one scroll cycle (`text_width + panel_width`).
    pub fn span(&self) -> u32 {
        self.strip.width()
    }

    /// Vertical position of the scrolling line.
    pub fn line_y(&self) -> i32 {
        self.y
    }

    /// The visible frame at `offset`, which must be below [`span`](Self::span).
    pub fn frame_at(&self, offset: u32) -> Frame {
        let mut frame = self.base.clone();
        frame.paste(&self.strip, offset, self.base.width(), Point::new(0, self.y));
        frame
    }
}

/// Draws pages for a panel of a given size.
#[derive(Debug, Clone, Copy)]
pub struct FrameRenderer {
    width: u32,
    height: u32,
}

impl FrameRenderer {
    /// Renderer for a `width` x `height` panel.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Panel width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Rendered width of `text` in `font`.
    pub fn text_width(&self, text: &str, font: FontSize) -> u32 {
        font.style()
            .measure_string(text, Point::zero(), Baseline::Top)
            .bounding_box
            .size
            .width
    }

    /// Where each piece of text goes for `content`.
    pub fn layout(&self, content: &PageContent) -> PageLayout {
        let header = TextLine::new(content.page().header(), 0, FontSize::Large);
        match content {
            PageContent::Game(game) => PageLayout {
                header,
                lines: vec![TextLine::new(&game.display_name, 20, FontSize::Small)],
                content: Some(TextLine::new(&game.game_title, 40, FontSize::Small)),
            },
            PageContent::Media(media) => PageLayout {
                header,
                lines: vec![
                    TextLine::new(&media.artist, 20, FontSize::Small),
                    TextLine::new(&media.album, 30, FontSize::Small),
                ],
                content: Some(TextLine::new(&media.title, 42, FontSize::Small)),
            },
            PageContent::Stats(stats) => PageLayout {
                header,
                lines: stats
                    .lines()
                    .into_iter()
                    .enumerate()
                    .map(|(i, line)| TextLine::new(line, 20 + i as i32 * 10, FontSize::Small))
                    .collect(),
                content: None,
            },
        }
    }

    /// Border, header and secondary lines, without the content line.
    pub fn base_frame(&self, layout: &PageLayout) -> Frame {
        let mut frame = Frame::new(self.width, self.height);
        let Ok(()) = Rectangle::new(Point::zero(), Size::new(self.width, self.height))
            .into_styled(PrimitiveStyle::with_stroke(BinaryColor::On, 1))
            .draw(&mut frame);

        self.draw_centered(&mut frame, &layout.header);
        for line in &layout.lines {
            self.draw_centered(&mut frame, line);
        }
        frame
    }

    /// Decide between a static frame and a scrolling strip for `content`.
    pub fn plan(&self, content: &PageContent) -> RenderPlan {
        let layout = self.layout(content);
        let mut base = self.base_frame(&layout);

        let Some(line) = layout.content else {
            return RenderPlan::Static(base);
        };

        let text_width = self.text_width(&line.text, line.font);
        if text_width <= self.width {
            self.draw_centered(&mut base, &line);
            return RenderPlan::Static(base);
        }

        // Text starts one panel width in so it enters from the right edge.
        let mut strip = Frame::new(text_width + self.width, STRIP_HEIGHT);
        let Ok(_) = Text::with_baseline(
            &line.text,
            Point::new(self.width as i32, 0),
            line.font.style(),
            Baseline::Top,
        )
        .draw(&mut strip);

        RenderPlan::Scrolling(ScrollPlan {
            base,
            strip,
            y: line.y,
        })
    }

    /// A single frame of `content` at scroll `offset`.
    ///
    /// Static content ignores the offset. Scrolling offsets wrap at the span.
    pub fn render(&self, content: &PageContent, offset: u32) -> Frame {
        match self.plan(content) {
            RenderPlan::Static(frame) => frame,
            RenderPlan::Scrolling(plan) => plan.frame_at(offset % plan.span()),
        }
    }

    fn draw_centered(&self, frame: &mut Frame, line: &TextLine) {
        let text_width = self.text_width(&line.text, line.font) as i32;
        let x = (self.width as i32 - text_width) / 2;
        let Ok(_) = Text::with_baseline(
            &line.text,
            Point::new(x, line.y),
            line.font.style(),
            Baseline::Top,
        )
        .draw(frame);
    }
}
