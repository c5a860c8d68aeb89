use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle in virtual screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    pub fn right(&self) -> i64 {
        i64::from(self.origin.x) + i64::from(self.size.width)
    }

    pub fn bottom(&self) -> i64 {
        i64::from(self.origin.y) + i64::from(self.size.height)
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.origin.x >= self.origin.x
            && other.origin.y >= self.origin.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// Translates `rect` by the smallest amount that puts it fully on `screen`,
/// independently per axis. A rect larger than the screen on an axis is
/// pinned to the screen's leading edge on that axis.
pub fn clamp_to_screen(rect: Rect, screen: Rect) -> Rect {
    let x = clamp_axis(
        rect.origin.x,
        rect.size.width,
        screen.origin.x,
        screen.size.width,
    );
    let y = clamp_axis(
        rect.origin.y,
        rect.size.height,
        screen.origin.y,
        screen.size.height,
    );
    Rect::new(Point::new(x, y), rect.size)
}

fn clamp_axis(pos: i32, len: u32, screen_pos: i32, screen_len: u32) -> i32 {
    let min = i64::from(screen_pos);
    let max = min + i64::from(screen_len) - i64::from(len);
    if max < min {
        return screen_pos;
    }
    i64::from(pos).clamp(min, max) as i32
}

/// Uniform position such that a window of `size` lies inside `screen`.
pub fn random_position<R: Rng + ?Sized>(rng: &mut R, screen: Rect, size: Size) -> Point {
    let span_x = screen.size.width.saturating_sub(size.width);
    let span_y = screen.size.height.saturating_sub(size.height);
    let dx = rng.gen_range(0..=span_x);
    let dy = rng.gen_range(0..=span_y);
    Point::new(
        screen.origin.x.saturating_add_unsigned(dx),
        screen.origin.y.saturating_add_unsigned(dy),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SCREEN: Rect = Rect::new(Point::new(0, 0), Size::new(1920, 1080));

    #[test]
    fn clamps_each_axis_independently() {
        let rect = Rect::new(Point::new(1800, 50), Size::new(300, 200));
        let clamped = clamp_to_screen(rect, SCREEN);
        assert_eq!(clamped.origin, Point::new(1620, 50));

        let rect = Rect::new(Point::new(-40, 1000), Size::new(300, 200));
        let clamped = clamp_to_screen(rect, SCREEN);
        assert_eq!(clamped.origin, Point::new(0, 880));
    }

    #[test]
    fn on_screen_rect_is_untouched() {
        let rect = Rect::new(Point::new(100, 100), Size::new(300, 300));
        assert_eq!(clamp_to_screen(rect, SCREEN), rect);
    }

    #[test]
    fn oversized_rect_pins_to_origin() {
        let screen = Rect::new(Point::new(1920, 0), Size::new(800, 600));
        let rect = Rect::new(Point::new(2500, 300), Size::new(1000, 100));
        let clamped = clamp_to_screen(rect, screen);
        assert_eq!(clamped.origin, Point::new(1920, 300));
    }

    #[test]
    fn random_positions_stay_on_screen() {
        let mut rng = StdRng::seed_from_u64(9);
        let screen = Rect::new(Point::new(-1280, 200), Size::new(1280, 1024));
        let size = Size::new(320, 480);
        for _ in 0..500 {
            let origin = random_position(&mut rng, screen, size);
            assert!(screen.contains_rect(&Rect::new(origin, size)));
        }
    }

    #[test]
    fn random_position_collapses_when_window_is_larger() {
        let mut rng = StdRng::seed_from_u64(1);
        let origin = random_position(&mut rng, SCREEN, Size::new(4000, 100));
        assert_eq!(origin.x, 0);
    }
}
