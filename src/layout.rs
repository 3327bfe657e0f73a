use crate::{LayoutError, LayoutOptions, DEFAULT_OPTIONS, Point, Size, Rectangle, point2, size2};

#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
struct NodeIndex(u32);

impl NodeIndex {
    const NONE: Self = NodeIndex(std::u32::MAX);
    const ROOT: Self = NodeIndex(0);

    fn index(self) -> usize { self.0 as usize }

    fn is_some(self) -> bool { self.0 != std::u32::MAX }

    fn is_none(self) -> bool { self.0 == std::u32::MAX }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
struct Node {
    origin: Point,
    size: Size,
    /// For nodes in the free list, the next free node.
    parent: NodeIndex,
    child_a: NodeIndex,
    child_b: NodeIndex,
    /// Only ever set on leaves.
    used: bool,
}

impl Node {
    fn leaf(origin: Point, size: Size, parent: NodeIndex) -> Self {
        Node {
            origin,
            size,
            parent,
            child_a: NodeIndex::NONE,
            child_b: NodeIndex::NONE,
            used: false,
        }
    }

    fn is_leaf(&self) -> bool {
        self.child_a.is_none()
    }

    fn rectangle(&self) -> Rectangle {
        Rectangle {
            min: self.origin,
            max: point2(self.origin.x + self.size.width, self.origin.y + self.size.height),
        }
    }
}

/// An incremental texture layout backed by a binary tree of rectangular regions.
///
/// The root region spans the maximum size of the texture. When an element is added, the
/// first free leaf (in depth-first order) that can hold it is split in two: one child
/// that matches the element along one axis and one child holding the remainder. Splitting
/// continues in the first child until a leaf of exactly the requested size is found.
///
/// The layout also tracks the size of the texture actually needed to contain the
/// elements placed so far. Allocation first looks for room within that size and only
/// grows it (up to the maximum size) when no such room exists. The tracked size never
/// shrinks, even when elements are removed.
///
/// When an element is removed, the largest enclosing subtree that no longer contains
/// any element is collapsed back into a single free leaf so that large elements can be
/// placed there again.
///
/// Inserting elements by decreasing size gives the best results.
#[derive(Clone)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct TextureLayout {
    nodes: Vec<Node>,
    free_nodes: NodeIndex,
    size: Size,
    min_size: Size,
    max_size: Size,
    power_of_two: bool,
    align_by_four: bool,
}

impl TextureLayout {
    /// Create a texture layout with provided options.
    ///
    /// The tracked size starts at `min_size` and can grow up to `max_size`. A minimum
    /// size larger than the maximum size is clamped to it.
    pub fn with_options(min_size: Size, max_size: Size, options: &LayoutOptions) -> Self {
        let min_size = min_size.min(max_size);

        TextureLayout {
            nodes: vec![Node::leaf(point2(0, 0), max_size, NodeIndex::NONE)],
            free_nodes: NodeIndex::NONE,
            size: min_size,
            min_size,
            max_size,
            power_of_two: options.power_of_two,
            align_by_four: options.align_by_four,
        }
    }

    /// Create a texture layout with default options.
    pub fn new(min_size: Size, max_size: Size) -> Self {
        Self::with_options(min_size, max_size, &DEFAULT_OPTIONS)
    }

    /// Remove all elements and go back to the initial size.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.nodes.push(Node::leaf(point2(0, 0), self.max_size, NodeIndex::NONE));
        self.free_nodes = NodeIndex::NONE;
        self.size = self.min_size;
    }

    /// The size of the texture needed to contain every element placed so far.
    pub fn size(&self) -> Size {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn max_size(&self) -> Size {
        self.max_size
    }

    pub fn options(&self) -> LayoutOptions {
        LayoutOptions {
            power_of_two: self.power_of_two,
            align_by_four: self.align_by_four,
        }
    }

    pub fn is_empty(&self) -> bool {
        let root = &self.nodes[NodeIndex::ROOT.index()];

        root.is_leaf() && !root.used
    }

    /// Add an element to the layout and return the position of its upper-left corner.
    ///
    /// Elements with an empty size take no space and are always placed at the origin.
    pub fn add(&mut self, requested_size: Size) -> Result<Point, LayoutError> {
        if requested_size.is_empty() {
            return Ok(point2(0, 0));
        }

        let failed = LayoutError::AllocationFailed {
            width: requested_size.width,
            height: requested_size.height,
        };

        let size = self.adjust_size(requested_size).ok_or(failed)?;
        if size.width > self.max_size.width || size.height > self.max_size.height {
            return Err(failed);
        }

        // Prefer the space we already committed to before growing the texture.
        let leaf = match self.find_leaf(size, false) {
            Some(leaf) => leaf,
            None => self.find_leaf(size, true).ok_or(failed)?,
        };

        let node = &mut self.nodes[leaf.index()];
        node.used = true;
        let origin = node.origin;

        let mut extent = size2(origin.x + size.width, origin.y + size.height);
        if self.power_of_two {
            extent = size2(
                next_power_of_two(extent.width),
                next_power_of_two(extent.height),
            );
        }
        self.size = self.size.max(extent).min(self.max_size);

        log::trace!(
            "placed {}x{} element at ({}, {}), layout size {}x{}",
            size.width, size.height, origin.x, origin.y, self.size.width, self.size.height,
        );

        self.check();

        Ok(origin)
    }

    /// Remove an element previously returned by `add`.
    ///
    /// `size` is the size that was passed to `add`. Returns false if no element with
    /// this position and size is currently allocated.
    pub fn remove(&mut self, origin: Point, size: Size) -> bool {
        if size.is_empty() {
            return false;
        }

        let size = match self.adjust_size(size) {
            Some(size) => size,
            None => return false,
        };

        let leaf = match self.find_used_leaf(origin, size) {
            Some(leaf) => leaf,
            None => return false,
        };

        self.nodes[leaf.index()].used = false;

        // Walk up as long as the sibling subtree is unused, the highest such ancestor
        // can be collapsed into a single free leaf.
        let mut collapse = NodeIndex::NONE;
        let mut current = leaf;
        let mut parent = self.nodes[leaf.index()].parent;
        while parent.is_some() {
            let node = &self.nodes[parent.index()];
            let sibling = if node.child_a == current { node.child_b } else { node.child_a };
            if self.is_used(sibling) {
                break;
            }

            collapse = parent;
            current = parent;
            parent = node.parent;
        }

        if collapse.is_some() {
            self.collapse(collapse);
        }

        self.check();

        true
    }

    /// Same as `remove` but reports missing elements as an error.
    pub fn try_remove(&mut self, origin: Point, size: Size) -> Result<(), LayoutError> {
        if self.remove(origin, size) {
            return Ok(());
        }

        Err(LayoutError::NotFound {
            x: origin.x,
            y: origin.y,
            width: size.width,
            height: size.height,
        })
    }

    /// Number of texels covered by allocated elements, alignment included.
    pub fn allocated_space(&self) -> u64 {
        let mut area = 0;
        self.for_each_allocated_rectangle(|rect| {
            let size = rect.size();
            area += size.width as u64 * size.height as u64;
        });

        area
    }

    /// Invoke a callback for each allocated element, alignment included.
    pub fn for_each_allocated_rectangle<F>(&self, mut callback: F)
    where
        F: FnMut(Rectangle),
    {
        self.for_each_leaf(|node| {
            if node.used {
                callback(node.rectangle());
            }
        });
    }

    /// Invoke a callback for each free region of the tree.
    pub fn for_each_free_rectangle<F>(&self, mut callback: F)
    where
        F: FnMut(Rectangle),
    {
        self.for_each_leaf(|node| {
            if !node.used {
                callback(node.rectangle());
            }
        });
    }

    fn adjust_size(&self, size: Size) -> Option<Size> {
        if !self.align_by_four {
            return Some(size);
        }

        Some(size2(align_up(4, size.width)?, align_up(4, size.height)?))
    }

    /// First-fit depth-first search for a free leaf that can hold an element of the
    /// provided size, splitting it if needed.
    ///
    /// If `allow_growth` is false, only leaves that keep the element within the
    /// currently tracked size are considered.
    fn find_leaf(&mut self, size: Size, allow_growth: bool) -> Option<NodeIndex> {
        let mut stack = vec![NodeIndex::ROOT];

        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx.index()];

            if !node.is_leaf() {
                stack.push(node.child_b);
                stack.push(node.child_a);
                continue;
            }

            if node.used || node.size.width < size.width || node.size.height < size.height {
                continue;
            }

            if !allow_growth
                && (node.origin.x + size.width > self.size.width
                    || node.origin.y + size.height > self.size.height)
            {
                continue;
            }

            if node.size == size {
                return Some(idx);
            }

            let origin = node.origin;
            let excess_width = node.size.width - size.width;
            let excess_height = node.size.height - size.height;

            // Ties split horizontally.
            let (a, b) = if excess_width > excess_height {
                (
                    Node::leaf(origin, size2(size.width, node.size.height), idx),
                    Node::leaf(
                        point2(origin.x + size.width, origin.y),
                        size2(excess_width, node.size.height),
                        idx,
                    ),
                )
            } else {
                (
                    Node::leaf(origin, size2(node.size.width, size.height), idx),
                    Node::leaf(
                        point2(origin.x, origin.y + size.height),
                        size2(node.size.width, excess_height),
                        idx,
                    ),
                )
            };

            let child_a = self.add_node(a);
            let child_b = self.add_node(b);

            let node = &mut self.nodes[idx.index()];
            node.child_a = child_a;
            node.child_b = child_b;

            // The first child always fits the element.
            stack.push(child_a);
        }

        None
    }

    fn find_used_leaf(&self, origin: Point, size: Size) -> Option<NodeIndex> {
        let mut stack = vec![NodeIndex::ROOT];

        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx.index()];

            if !node.is_leaf() {
                stack.push(node.child_b);
                stack.push(node.child_a);
                continue;
            }

            if node.used && node.origin == origin && node.size == size {
                return Some(idx);
            }
        }

        None
    }

    /// Whether the subtree contains at least one used leaf.
    fn is_used(&self, idx: NodeIndex) -> bool {
        let mut stack = vec![idx];

        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx.index()];

            if node.is_leaf() {
                if node.used {
                    return true;
                }
                continue;
            }

            stack.push(node.child_b);
            stack.push(node.child_a);
        }

        false
    }

    /// Turn a subtree back into a single free leaf.
    fn collapse(&mut self, idx: NodeIndex) {
        let node = &mut self.nodes[idx.index()];
        let mut stack = vec![node.child_a, node.child_b];
        node.child_a = NodeIndex::NONE;
        node.child_b = NodeIndex::NONE;
        node.used = false;

        while let Some(child) = stack.pop() {
            let node = &self.nodes[child.index()];
            if !node.is_leaf() {
                stack.push(node.child_a);
                stack.push(node.child_b);
            }

            self.remove_node(child);
        }
    }

    fn for_each_leaf<F>(&self, mut callback: F)
    where
        F: FnMut(&Node),
    {
        let mut stack = vec![NodeIndex::ROOT];

        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx.index()];

            if node.is_leaf() {
                callback(node);
                continue;
            }

            stack.push(node.child_b);
            stack.push(node.child_a);
        }
    }

    fn add_node(&mut self, node: Node) -> NodeIndex {
        if self.free_nodes.is_some() {
            let idx = self.free_nodes;
            self.free_nodes = self.nodes[idx.index()].parent;
            self.nodes[idx.index()] = node;

            return idx;
        }

        let idx = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(node);

        idx
    }

    fn remove_node(&mut self, idx: NodeIndex) {
        let node = &mut self.nodes[idx.index()];
        node.child_a = NodeIndex::NONE;
        node.child_b = NodeIndex::NONE;
        node.used = false;
        node.parent = self.free_nodes;
        self.free_nodes = idx;
    }

    #[cfg(not(any(test, feature = "checks")))]
    fn check(&self) {}

    #[cfg(any(test, feature = "checks"))]
    fn check(&self) {
        assert!(self.size.width <= self.max_size.width);
        assert!(self.size.height <= self.max_size.height);

        let root = &self.nodes[NodeIndex::ROOT.index()];
        assert!(root.parent.is_none());
        assert_eq!(root.origin, point2(0, 0));
        assert_eq!(root.size, self.max_size);

        let mut stack = vec![NodeIndex::ROOT];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx.index()];
            assert_eq!(node.child_a.is_none(), node.child_b.is_none());
            assert!(!node.size.is_empty());

            if node.is_leaf() {
                continue;
            }

            assert!(!node.used, "internal node {:?} is marked used", idx);
            // Unused subtrees are always collapsed.
            assert!(self.is_used(idx), "internal node {:?} has no used leaf", idx);

            let a = &self.nodes[node.child_a.index()];
            let b = &self.nodes[node.child_b.index()];
            assert_eq!(a.parent, idx);
            assert_eq!(b.parent, idx);
            assert_eq!(a.origin, node.origin);

            let vertical_split = a.size.height == node.size.height
                && b.size.height == node.size.height
                && a.size.width + b.size.width == node.size.width
                && b.origin == point2(node.origin.x + a.size.width, node.origin.y);
            let horizontal_split = a.size.width == node.size.width
                && b.size.width == node.size.width
                && a.size.height + b.size.height == node.size.height
                && b.origin == point2(node.origin.x, node.origin.y + a.size.height);
            assert!(vertical_split != horizontal_split, "bad split at node {:?}", idx);

            stack.push(node.child_a);
            stack.push(node.child_b);
        }
    }

    /// Dump a visual representation of the layout in SVG format.
    #[cfg(feature = "svg")]
    pub fn dump_svg(&self, output: &mut dyn std::io::Write) -> std::io::Result<()> {
        use svg_fmt::*;

        writeln!(
            output,
            "{}",
            BeginSvg {
                w: self.max_size.width as f32,
                h: self.max_size.height as f32
            }
        )?;

        self.dump_into_svg(None, output)?;

        writeln!(output, "{}", EndSvg)
    }

    /// Dump a visual representation of the layout in SVG, omitting the beginning and end
    /// of the SVG document, so that it can be included in a larger document.
    ///
    /// If a rectangle is provided, translate and scale the output to fit it.
    #[cfg(feature = "svg")]
    pub fn dump_into_svg(&self, rect: Option<&Rectangle>, output: &mut dyn std::io::Write) -> std::io::Result<()> {
        use svg_fmt::*;

        let (sx, sy, tx, ty) = if let Some(rect) = rect {
            (
                rect.size().width as f32 / self.max_size.width as f32,
                rect.size().height as f32 / self.max_size.height as f32,
                rect.min.x as f32,
                rect.min.y as f32,
            )
        } else {
            (1.0, 1.0, 0.0, 0.0)
        };

        writeln!(
            output,
            r#"    {}"#,
            rectangle(tx, ty, self.max_size.width as f32 * sx, self.max_size.height as f32 * sy)
                .fill(rgb(40, 40, 40))
                .stroke(Stroke::Color(black(), 1.0))
        )?;

        let mut result = Ok(());
        self.for_each_leaf(|node| {
            if result.is_err() {
                return;
            }

            let color = if node.used {
                rgb(70, 70, 180)
            } else {
                rgb(50, 50, 50)
            };

            result = writeln!(
                output,
                r#"    {}"#,
                rectangle(
                    node.origin.x as f32 * sx + tx,
                    node.origin.y as f32 * sy + ty,
                    node.size.width as f32 * sx,
                    node.size.height as f32 * sy,
                )
                .fill(color)
                .stroke(Stroke::Color(black(), 1.0))
            );
        });
        result?;

        // Outline of the texture size currently in use.
        writeln!(
            output,
            r#"    {}"#,
            rectangle(tx, ty, self.size.width as f32 * sx, self.size.height as f32 * sy)
                .fill(Fill::None)
                .stroke(Stroke::Color(rgb(220, 170, 40), 2.0))
        )
    }
}

fn align_up(alignment: u32, size: u32) -> Option<u32> {
    let rem = size % alignment;
    if rem > 0 {
        return size.checked_add(alignment - rem);
    }

    Some(size)
}

fn next_power_of_two(size: u32) -> u32 {
    size.checked_next_power_of_two().unwrap_or(std::u32::MAX)
}

#[cfg(test)]
fn collect_allocated(layout: &TextureLayout) -> Vec<Rectangle> {
    let mut rects = Vec::new();
    layout.for_each_allocated_rectangle(|rect| rects.push(rect));

    rects
}

#[cfg(test)]
fn rect(origin: Point, size: Size) -> Rectangle {
    Rectangle {
        min: origin,
        max: point2(origin.x + size.width, origin.y + size.height),
    }
}

#[test]
fn layout_basic() {
    let mut layout = TextureLayout::new(size2(1, 1), size2(1024, 1024));
    assert!(layout.is_empty());

    let full = layout.add(size2(1024, 1024)).unwrap();
    assert_eq!(full, point2(0, 0));
    assert!(layout.add(size2(1, 1)).is_err());
    assert!(layout.remove(full, size2(1024, 1024)));
    assert!(layout.is_empty());

    let sizes = [
        size2(10, 10),
        size2(50, 30),
        size2(12, 45),
        size2(60, 45),
        size2(1, 1),
        size2(128, 128),
        size2(256, 256),
    ];
    let mut placed = Vec::new();
    for &size in &sizes {
        placed.push((layout.add(size).unwrap(), size));
    }
    assert!(!layout.is_empty());

    for &i in &[1, 5, 2, 4] {
        let (origin, size) = placed[i];
        assert!(layout.remove(origin, size));
    }

    let h = layout.add(size2(500, 200)).unwrap();
    let (origin, size) = placed[0];
    assert!(layout.remove(origin, size));
    let i = layout.add(size2(500, 200)).unwrap();

    for &i in &[6, 3] {
        let (origin, size) = placed[i];
        assert!(layout.remove(origin, size));
    }
    assert!(layout.remove(h, size2(500, 200)));
    assert!(layout.remove(i, size2(500, 200)));
    assert!(layout.is_empty());

    let full = layout.add(size2(1024, 1024)).unwrap();
    assert_eq!(full, point2(0, 0));
    assert!(layout.add(size2(1, 1)).is_err());
    assert!(layout.remove(full, size2(1024, 1024)));
    assert!(layout.is_empty());
}

#[test]
fn empty_elements() {
    let mut layout = TextureLayout::new(size2(16, 16), size2(256, 256));

    assert_eq!(layout.add(size2(0, 10)), Ok(point2(0, 0)));
    assert_eq!(layout.add(size2(10, 0)), Ok(point2(0, 0)));
    assert_eq!(layout.add(size2(0, 0)), Ok(point2(0, 0)));

    assert_eq!(layout.size(), size2(16, 16));
    assert!(layout.is_empty());
    assert_eq!(layout.nodes.len(), 1);

    assert!(!layout.remove(point2(0, 0), size2(0, 10)));
}

#[test]
fn end_to_end_power_of_two() {
    let mut layout = TextureLayout::with_options(
        size2(1, 1),
        size2(256, 256),
        &LayoutOptions {
            power_of_two: true,
            align_by_four: true,
        },
    );

    // Aligned to 100x52.
    assert_eq!(layout.add(size2(100, 50)), Ok(point2(0, 0)));
    assert_eq!(layout.width(), 128);
    assert_eq!(layout.height(), 64);

    // Does not fit in 128x64, grows into the remainder on the right.
    assert_eq!(layout.add(size2(100, 50)), Ok(point2(100, 0)));
    assert_eq!(layout.width(), 256);
    assert_eq!(layout.height(), 64);

    assert_eq!(layout.add(size2(100, 50)), Ok(point2(0, 52)));
    assert_eq!(layout.size(), size2(256, 128));
}

#[test]
fn power_of_two_sizes() {
    let mut layout = TextureLayout::with_options(
        size2(1, 1),
        size2(1024, 1024),
        &LayoutOptions {
            power_of_two: true,
            align_by_four: false,
        },
    );

    let sizes = [(300, 20), (7, 90), (33, 33), (1, 1), (513, 3), (64, 65), (200, 200)];
    for &(w, h) in &sizes {
        layout.add(size2(w, h)).unwrap();
        assert!(layout.width().is_power_of_two(), "{:?}", layout.size());
        assert!(layout.height().is_power_of_two(), "{:?}", layout.size());
    }
}

#[test]
fn power_of_two_keeps_min_size() {
    let mut layout = TextureLayout::with_options(
        size2(100, 100),
        size2(1000, 1000),
        &LayoutOptions {
            power_of_two: true,
            align_by_four: false,
        },
    );

    layout.add(size2(10, 10)).unwrap();
    assert_eq!(layout.size(), size2(100, 100));

    // Never rounded past the maximum size.
    layout.add(size2(990, 10)).unwrap();
    assert_eq!(layout.size(), size2(1000, 100));
}

#[test]
fn align_by_four() {
    let mut layout = TextureLayout::new(size2(1, 1), size2(64, 64));

    assert_eq!(layout.add(size2(5, 5)), Ok(point2(0, 0)));
    assert_eq!(layout.size(), size2(8, 8));
    assert_eq!(collect_allocated(&layout), vec![rect(point2(0, 0), size2(8, 8))]);

    // Same as if 8x8 had been requested.
    assert_eq!(layout.add(size2(5, 5)), Ok(point2(8, 0)));

    assert!(layout.remove(point2(0, 0), size2(5, 5)));
    assert!(layout.remove(point2(8, 0), size2(8, 8)));
    assert!(layout.is_empty());

    let mut unaligned = TextureLayout::with_options(
        size2(1, 1),
        size2(64, 64),
        &LayoutOptions {
            power_of_two: false,
            align_by_four: false,
        },
    );
    assert_eq!(unaligned.add(size2(5, 5)), Ok(point2(0, 0)));
    assert_eq!(unaligned.size(), size2(5, 5));
    assert_eq!(unaligned.add(size2(5, 5)), Ok(point2(5, 0)));
}

#[test]
fn fill_tracked_size_first() {
    let mut layout = TextureLayout::new(size2(64, 64), size2(256, 256));

    assert_eq!(layout.add(size2(32, 32)), Ok(point2(0, 0)));
    assert_eq!(layout.add(size2(32, 32)), Ok(point2(32, 0)));
    assert_eq!(layout.add(size2(64, 32)), Ok(point2(0, 32)));
    assert_eq!(layout.size(), size2(64, 64));

    // Only now does the layout need to grow.
    assert_eq!(layout.add(size2(32, 32)), Ok(point2(64, 0)));
    assert_eq!(layout.size(), size2(96, 64));
}

#[test]
fn remove_and_add_again() {
    let mut layout = TextureLayout::new(size2(1, 1), size2(256, 256));

    let a = layout.add(size2(64, 64)).unwrap();
    let b = layout.add(size2(64, 64)).unwrap();
    assert_eq!(a, point2(0, 0));
    assert_eq!(b, point2(64, 0));

    assert!(layout.remove(a, size2(64, 64)));
    assert!(!layout.remove(a, size2(64, 64)));
    assert_eq!(
        layout.try_remove(a, size2(64, 64)),
        Err(LayoutError::NotFound { x: 0, y: 0, width: 64, height: 64 }),
    );

    // The freed leaf is reused.
    assert_eq!(layout.add(size2(64, 64)), Ok(a));
    assert_eq!(layout.size(), size2(128, 64));

    assert!(layout.remove(a, size2(64, 64)));
    assert!(layout.remove(b, size2(64, 64)));
    assert!(!layout.remove(b, size2(64, 64)));
    assert!(layout.is_empty());
    assert_eq!(layout.nodes[0].child_a, NodeIndex::NONE);

    // Removing does not shrink the tracked size.
    assert_eq!(layout.size(), size2(128, 64));
}

#[test]
fn remove_wrong_rectangle() {
    let mut layout = TextureLayout::new(size2(1, 1), size2(256, 256));

    let a = layout.add(size2(32, 16)).unwrap();
    assert!(!layout.remove(a, size2(16, 32)));
    assert!(!layout.remove(point2(4, 0), size2(32, 16)));
    assert!(!layout.is_empty());
    assert!(layout.remove(a, size2(32, 16)));
}

#[test]
fn collapse_restores_space() {
    let mut layout = TextureLayout::new(size2(1, 1), size2(128, 128));

    let mut placed = Vec::new();
    for _ in 0..4 {
        placed.push(layout.add(size2(64, 64)).unwrap());
    }
    assert!(layout.add(size2(4, 4)).is_err());
    assert_eq!(layout.allocated_space(), 128 * 128);

    // Freeing a corner is not enough for a larger element.
    assert!(layout.remove(placed[3], size2(64, 64)));
    assert!(layout.add(size2(128, 64)).is_err());

    for &origin in &placed[..3] {
        assert!(layout.remove(origin, size2(64, 64)));
    }

    assert!(layout.is_empty());
    assert_eq!(layout.add(size2(128, 128)), Ok(point2(0, 0)));
}

#[test]
fn node_slots_are_recycled() {
    let mut layout = TextureLayout::new(size2(1, 1), size2(512, 512));

    for _ in 0..10 {
        let mut placed = Vec::new();
        for i in 1..20 {
            let size = size2(i * 4, 24 - i);
            placed.push((layout.add(size).unwrap(), size));
        }
        for (origin, size) in placed {
            assert!(layout.remove(origin, size));
        }
        assert!(layout.is_empty());
    }

    // Each element splits at most two leaves, and freed slots are reused.
    assert!(layout.nodes.len() <= 1 + 4 * 19, "{} nodes", layout.nodes.len());
}

#[test]
fn saturation() {
    fn fill(sizes: &[Size]) -> Vec<Point> {
        let mut layout = TextureLayout::new(size2(1, 1), size2(256, 256));
        let mut placed = Vec::new();
        for &size in sizes.iter().cycle() {
            match layout.add(size) {
                Ok(origin) => placed.push(origin),
                Err(_) => break,
            }
        }

        placed
    }

    let placed = fill(&[size2(64, 64)]);
    assert_eq!(placed.len(), 16);

    let sizes = [size2(60, 30), size2(17, 90), size2(45, 45)];
    let first = fill(&sizes);
    let second = fill(&sizes);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn clear() {
    let mut layout = TextureLayout::new(size2(8, 8), size2(256, 256));

    layout.add(size2(100, 100)).unwrap();
    layout.add(size2(30, 10)).unwrap();
    assert_eq!(layout.size(), size2(132, 100));

    layout.clear();
    assert!(layout.is_empty());
    assert_eq!(layout.size(), size2(8, 8));
    assert_eq!(layout.allocated_space(), 0);
    assert_eq!(layout.add(size2(256, 256)), Ok(point2(0, 0)));
}

#[test]
fn random_add_remove() {
    // Deterministic pseudo-random sequence.
    let mut seed: u32 = 0x2545_f491;
    let mut next = move |range: u32| {
        seed ^= seed << 13;
        seed ^= seed >> 17;
        seed ^= seed << 5;
        seed % range
    };

    let mut layout = TextureLayout::with_options(
        size2(16, 16),
        size2(512, 512),
        &LayoutOptions {
            power_of_two: false,
            align_by_four: true,
        },
    );

    let mut placed: Vec<Rectangle> = Vec::new();
    let mut requested: Vec<Size> = Vec::new();
    let mut prev_size = layout.size();

    for _ in 0..2000 {
        if next(3) == 0 && !placed.is_empty() {
            let idx = next(placed.len() as u32) as usize;
            let origin = placed.swap_remove(idx).min;
            let size = requested.swap_remove(idx);
            assert!(layout.remove(origin, size));
        } else {
            let size = size2(next(64) + 1, next(64) + 1);
            if let Ok(origin) = layout.add(size) {
                let new_rect = rect(origin, size);

                assert!(new_rect.max.x <= layout.width());
                assert!(new_rect.max.y <= layout.height());
                for previous in &placed {
                    assert!(!new_rect.intersects(previous), "{:?} overlaps {:?}", new_rect, previous);
                }

                placed.push(new_rect);
                requested.push(size);
            }
        }

        let size = layout.size();
        assert!(size.width >= prev_size.width);
        assert!(size.height >= prev_size.height);
        prev_size = size;
    }

    for (rect, size) in placed.iter().zip(requested.iter()) {
        assert!(layout.remove(rect.min, *size));
    }

    assert!(layout.is_empty());
    assert_eq!(layout.allocated_space(), 0);
}

#[test]
fn too_large() {
    let mut layout = TextureLayout::new(size2(1, 1), size2(100, 100));

    assert_eq!(
        layout.add(size2(101, 4)),
        Err(LayoutError::AllocationFailed { width: 101, height: 4 }),
    );
    // 98 is aligned to 100.
    assert!(layout.add(size2(98, 98)).is_ok());
    assert!(layout.add(size2(std::u32::MAX, 1)).is_err());
    assert_eq!(layout.size(), size2(100, 100));
}

#[test]
fn min_size_above_max_size() {
    let mut layout = TextureLayout::new(size2(300, 200), size2(256, 256));
    assert_eq!(layout.size(), size2(256, 200));

    assert_eq!(layout.add(size2(256, 256)), Ok(point2(0, 0)));
    assert_eq!(layout.size(), size2(256, 256));

    layout.clear();
    assert_eq!(layout.size(), size2(256, 200));
}

#[cfg(feature = "svg")]
#[test]
fn dump_svg() {
    let mut layout = TextureLayout::new(size2(1, 1), size2(256, 256));
    layout.add(size2(100, 30)).unwrap();
    layout.add(size2(20, 60)).unwrap();

    let mut output = Vec::new();
    layout.dump_svg(&mut output).unwrap();
    let svg = String::from_utf8(output).unwrap();

    assert!(svg.starts_with("<svg"));
    assert!(svg.trim_end().ends_with("</svg>"));
}
