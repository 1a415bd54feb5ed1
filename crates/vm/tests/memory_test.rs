use types::PagePerms;
use vm::memory::{Access, Memory};

const PAGE: usize = 4096;

#[test]
fn map_and_translate_respects_permissions() {
    let mut mem = Memory::new(64 * 1024);
    let root = mem.create_root();
    assert!(mem.map_pages(root, 0x1000, 2, PagePerms::user_rw()));

    assert!(mem.translate(root, 0x1000, Access::Load, true).is_some());
    assert!(mem.translate(root, 0x1234, Access::Store, true).is_some());
    // no execute bit on a data page
    assert!(mem.translate(root, 0x1000, Access::Fetch, true).is_none());
    // one past the mapped range
    assert!(mem.translate(root, 0x3000, Access::Load, true).is_none());
}

#[test]
fn user_bit_gates_user_accesses_only() {
    let mut mem = Memory::new(64 * 1024);
    let root = mem.create_root();
    assert!(mem.map_pages(root, 0x5000, 1, PagePerms::kernel_rw()));

    assert!(mem.translate(root, 0x5000, Access::Load, true).is_none());
    assert!(mem.translate(root, 0x5000, Access::Load, false).is_some());
}

#[test]
fn copies_cross_page_boundaries() {
    let mut mem = Memory::new(64 * 1024);
    let root = mem.create_root();
    assert!(mem.map_pages(root, 0x1000, 2, PagePerms::user_rw()));

    let data: Vec<u8> = (0..=255).cycle().take(PAGE + 100).map(|b| b as u8).collect();
    assert!(mem.copy_out(root, 0x1000, &data));
    let mut back = vec![0u8; data.len()];
    assert!(mem.copy_in(root, 0x1000, &mut back));
    assert_eq!(data, back);
}

#[test]
fn unmap_returns_frames_for_reuse() {
    let mut mem = Memory::new(8 * PAGE);
    let root = mem.create_root();
    let before = mem.free_frame_count();
    assert!(mem.map_pages(root, 0x1000, 3, PagePerms::user_rw()));
    assert_eq!(mem.free_frame_count(), before - 3);

    assert_eq!(mem.unmap_pages(root, 0x1000, 3, true), 3);
    assert_eq!(mem.free_frame_count(), before);
    assert!(mem.translate(root, 0x1000, Access::Load, false).is_none());

    // the freed frames satisfy the next mapping
    assert!(mem.map_pages(root, 0x9000, 3, PagePerms::user_rw()));
}

#[test]
fn map_fails_when_frames_run_out() {
    let mut mem = Memory::new(2 * PAGE);
    let root = mem.create_root();
    assert!(!mem.map_pages(root, 0x1000, 3, PagePerms::user_rw()));
}

#[test]
fn duplicate_is_an_eager_copy_below_the_bound() {
    let mut mem = Memory::new(64 * 1024);
    let src = mem.create_root();
    assert!(mem.map_pages(src, 0x1000, 1, PagePerms::user_rw()));
    assert!(mem.map_pages(src, 0x4000, 1, PagePerms::user_rw()));
    assert!(mem.copy_out(src, 0x1000, b"hello"));

    let dst = mem.create_root();
    // bound excludes the page at 0x4000 (page index 4)
    assert!(mem.duplicate(src, dst, 2));

    let mut buf = [0u8; 5];
    assert!(mem.copy_in(dst, 0x1000, &mut buf));
    assert_eq!(&buf, b"hello");
    assert!(mem.translate(dst, 0x4000, Access::Load, false).is_none());

    // writes to the source stay invisible to the copy
    assert!(mem.copy_out(src, 0x1000, b"HELLO"));
    assert!(mem.copy_in(dst, 0x1000, &mut buf));
    assert_eq!(&buf, b"hello");
}

#[test]
fn copy_in_str_stops_at_the_terminator() {
    let mut mem = Memory::new(64 * 1024);
    let root = mem.create_root();
    assert!(mem.map_pages(root, 0x1000, 1, PagePerms::user_rw()));
    assert!(mem.copy_out(root, 0x1000, b"image\0garbage"));

    assert_eq!(mem.copy_in_str(root, 0x1000, 64).as_deref(), Some("image"));
    assert!(mem.copy_in_str(root, 0x8000_0000, 64).is_none());
}

#[test]
fn free_root_releases_every_frame() {
    let mut mem = Memory::new(16 * PAGE);
    let before = mem.free_frame_count();
    let root = mem.create_root();
    assert!(mem.map_pages(root, 0x1000, 4, PagePerms::user_rw()));
    mem.free_root(root);
    assert_eq!(mem.free_frame_count(), before);
}
