use serde::Serialize;

use crate::models::Post;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PostPage {
    pub items: Vec<Post>,
    pub pagination: Pagination,
}

/// Slices `posts` into the 1-based `page`. The page is clamped into
/// `1..=total_pages`, and there is always at least one (possibly empty) page.
pub fn paginate(posts: &[Post], page: usize, page_size: usize) -> PostPage {
    let page_size = page_size.max(1);
    let total_items = posts.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let current_page = page.clamp(1, total_pages);

    let start = (current_page - 1) * page_size;
    let end = (start + page_size).min(total_items);
    let items = posts.get(start..end).map(<[Post]>::to_vec).unwrap_or_default();

    PostPage {
        items,
        pagination: Pagination {
            current_page,
            total_pages,
            page_size,
            total_items,
            has_next: current_page < total_pages,
            has_prev: current_page > 1,
        },
    }
}
