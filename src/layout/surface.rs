//! The embedded rendering surface.
//!
//! A [`Surface`] owns the live document of one load: the tree, the reader
//! root, the viewport, the horizontal scroll offset and a cached layout.
//! It is valid from the moment content is attached until the load is
//! superseded or unmounted; nothing outside holds node handles past that.
//!
//! Geometry inside the surface uses content coordinates (column flow, before
//! scrolling) and client coordinates (what the surface viewport shows).
//! [`SurfaceFrame`] crosses the boundary into the host's coordinate spaces.

use crate::dom::{ArenaDom, ArenaNodeId};

use super::flow::{FlowLayout, FlowParams};
use super::geometry::{Point, Rect, Size};
use super::metrics::compute_container_width;

/// Id of the stylesheet element the surface manages.
pub const STYLE_ELEMENT_ID: &str = "reader-style";

/// Placement of the surface inside the host.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SurfaceFrame {
    /// Top-left of the surface viewport in host-viewport coordinates.
    pub surface_origin: Point,
    /// Top-left of the container that positions overlays (action menus,
    /// citation popovers), in host-viewport coordinates.
    pub container_origin: Point,
}

impl SurfaceFrame {
    /// Surface client rect to host-viewport coordinates.
    pub fn to_host(&self, rect: Rect) -> Rect {
        rect.translate(self.surface_origin.x, self.surface_origin.y)
    }

    /// Surface client rect to overlay-container coordinates.
    pub fn to_container(&self, rect: Rect) -> Rect {
        rect.translate(
            self.surface_origin.x - self.container_origin.x,
            self.surface_origin.y - self.container_origin.y,
        )
    }
}

struct CachedLayout {
    generation: u64,
    params: FlowParams,
    layout: FlowLayout,
}

/// Live handle to the document of one load.
pub struct Surface {
    dom: ArenaDom,
    root: ArenaNodeId,
    viewport: Size,
    frame: SurfaceFrame,
    scroll_left: f32,
    params: Option<FlowParams>,
    cache: Option<CachedLayout>,
}

impl Surface {
    pub fn new(dom: ArenaDom, root: ArenaNodeId, viewport: Size) -> Self {
        Self {
            dom,
            root,
            viewport,
            frame: SurfaceFrame::default(),
            scroll_left: 0.0,
            params: None,
            cache: None,
        }
    }

    pub fn dom(&self) -> &ArenaDom {
        &self.dom
    }

    /// Mutable tree access. Any mutation invalidates the cached layout.
    pub fn dom_mut(&mut self) -> &mut ArenaDom {
        &mut self.dom
    }

    pub fn root(&self) -> ArenaNodeId {
        self.root
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
    }

    pub fn frame(&self) -> SurfaceFrame {
        self.frame
    }

    pub fn set_frame(&mut self, frame: SurfaceFrame) {
        self.frame = frame;
    }

    pub fn scroll_left(&self) -> f32 {
        self.scroll_left
    }

    pub fn set_scroll_left(&mut self, scroll_left: f32) {
        self.scroll_left = scroll_left.max(0.0);
    }

    pub fn params(&self) -> Option<&FlowParams> {
        self.params.as_ref()
    }

    /// Apply new layout parameters. The next [`Surface::refresh_layout`]
    /// typesets again if they differ from the cached ones.
    pub fn configure(&mut self, params: FlowParams) {
        self.params = Some(params);
    }

    /// Bring the cached layout up to date with the tree and parameters.
    /// Returns false when no parameters have been applied yet.
    pub fn refresh_layout(&mut self) -> bool {
        let Some(params) = &self.params else {
            return false;
        };
        let generation = self.dom.generation();
        let fresh = self
            .cache
            .as_ref()
            .is_some_and(|c| c.generation == generation && &c.params == params);
        if !fresh {
            log::trace!("typesetting surface at generation {generation}");
            let layout = FlowLayout::compute(&self.dom, self.root, params);
            self.cache = Some(CachedLayout {
                generation,
                params: params.clone(),
                layout,
            });
        }
        true
    }

    /// The cached layout, if it still matches the tree and parameters.
    pub fn layout(&self) -> Option<&FlowLayout> {
        let cache = self.cache.as_ref()?;
        let current = self.params.as_ref()?;
        (cache.generation == self.dom.generation() && &cache.params == current)
            .then_some(&cache.layout)
    }

    /// Width of the visible column box.
    pub fn container_width(&self) -> f32 {
        self.params.as_ref().map_or(0.0, |p| {
            compute_container_width(p.page_width, p.columns, p.gap)
        })
    }

    /// Left edge of the column box inside the surface viewport; the box is
    /// centred when the viewport is wider.
    pub fn root_left(&self) -> f32 {
        ((self.viewport.width - self.container_width()) / 2.0).max(0.0)
    }

    /// The visible column box in client coordinates.
    pub fn root_rect(&self) -> Rect {
        Rect::new(
            self.root_left(),
            0.0,
            self.container_width(),
            self.viewport.height,
        )
    }

    /// Content rect to client coordinates at the current scroll offset.
    pub fn to_client(&self, rect: Rect) -> Rect {
        rect.translate(self.root_left() - self.scroll_left, 0.0)
    }

    /// Replace the managed stylesheet in the document head.
    pub fn install_stylesheet(&mut self, css: &str) {
        let dom = &mut self.dom;
        let style = match dom.get_by_id(STYLE_ELEMENT_ID) {
            Some(existing) => {
                if dom.deep_text(existing) == css {
                    return;
                }
                let children: Vec<_> = dom.children(existing).collect();
                for child in children {
                    dom.detach(child);
                }
                existing
            }
            None => {
                let head = match dom.find_by_tag("head") {
                    Some(head) => head,
                    None => {
                        let head = dom.create_html_element("head", &[]);
                        let parent = dom.find_by_tag("html").unwrap_or(dom.document());
                        dom.append(parent, head);
                        head
                    }
                };
                let style = dom.create_html_element("style", &[("id", STYLE_ELEMENT_ID)]);
                dom.append(head, style);
                style
            }
        };
        dom.append_text(style, css);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use crate::layout::metrics::Columns;

    fn surface(html: &str) -> Surface {
        let dom = parse_html(html);
        let root = dom.get_by_id("reader-root").unwrap();
        let mut surface = Surface::new(dom, root, Size::new(1000.0, 616.0));
        surface.configure(FlowParams::new(
            Size::new(1000.0, 616.0),
            Columns::One,
            40.0,
            "serif",
            1.65,
            240.0,
        ));
        surface
    }

    #[test]
    fn test_layout_cache_tracks_generation() {
        let mut s = surface(r#"<div id="reader-root"><p>one</p></div>"#);
        assert!(s.layout().is_none());
        assert!(s.refresh_layout());
        assert!(s.layout().is_some());

        let p = s.dom().find_by_tag("p").unwrap();
        s.dom_mut().set_attr(p, "class", "x");
        assert!(s.layout().is_none());
        s.refresh_layout();
        assert!(s.layout().is_some());
    }

    #[test]
    fn test_root_is_centred_and_scroll_shifts_client_rects() {
        let mut s = surface(r#"<div id="reader-root"><p>one</p></div>"#);
        assert_eq!(s.container_width(), 750.0);
        assert_eq!(s.root_left(), 125.0);
        s.set_scroll_left(750.0);
        let client = s.to_client(Rect::new(790.0, 52.0, 10.0, 10.0));
        assert_eq!(client.x, 165.0);
        s.set_scroll_left(-5.0);
        assert_eq!(s.scroll_left(), 0.0);
    }

    #[test]
    fn test_frame_translates_rects() {
        let frame = SurfaceFrame {
            surface_origin: Point::new(100.0, 50.0),
            container_origin: Point::new(20.0, 10.0),
        };
        let rect = Rect::new(5.0, 5.0, 1.0, 1.0);
        assert_eq!(frame.to_host(rect), Rect::new(105.0, 55.0, 1.0, 1.0));
        assert_eq!(frame.to_container(rect), Rect::new(85.0, 45.0, 1.0, 1.0));
    }

    #[test]
    fn test_stylesheet_is_installed_once() {
        let mut s = surface(r#"<html><head></head><body><div id="reader-root"></div></body></html>"#);
        s.install_stylesheet("p { color: red; }");
        s.install_stylesheet("p { color: blue; }");
        let style = s.dom().get_by_id(STYLE_ELEMENT_ID).unwrap();
        assert_eq!(s.dom().deep_text(style), "p { color: blue; }");
        let styles = s.dom().elements_by_tag(s.dom().document(), &["style"]);
        assert_eq!(styles.len(), 1);
    }
}
