//! Positional rotation of fixed-size argument bundles.
//!
//! `rotate_right::<N, _>` moves the last `N` elements of a bundle to the
//! front and keeps every other element in its relative order:
//! `(a, b, c, d)` rotated by 1 is `(d, a, b, c)`. Bundles that carry an
//! argument appended at a known distance from the end (a trailing visitor,
//! for instance) are turned into the head-first shape that destructuring
//! expects.

/// Rotate a bundle right by `OFFSET` positions.
///
/// Implemented for tuples up to six elements (offsets `0..N`, and offset
/// `N` as the identity for one- and two-element tuples) and for arrays of
/// any length and offset.
pub trait RotateRight<const OFFSET: usize> {
    type Output;

    fn rotate_right(self) -> Self::Output;
}

/// Free-function form of [`RotateRight::rotate_right`].
///
/// ```
/// use partitioned_hashmap::rotate_right;
///
/// assert_eq!(rotate_right::<1, _>(('a', 'b', 'c', 'd')), ('d', 'a', 'b', 'c'));
/// assert_eq!(rotate_right::<1, _>(("x", 2)), (2, "x"));
/// assert_eq!(rotate_right::<0, _>((1, 2, 3)), (1, 2, 3));
/// ```
#[inline]
pub fn rotate_right<const OFFSET: usize, T>(bundle: T) -> T::Output
where
    T: RotateRight<OFFSET>,
{
    bundle.rotate_right()
}

macro_rules! impl_rotate_right {
    ($( $offset:literal : ($($t:ident $v:ident),*) => ($($rt:ident $rv:ident),*) ;)*) => {$(
        impl<$($t),*> RotateRight<$offset> for ($($t,)*) {
            type Output = ($($rt,)*);

            #[inline(always)]
            #[allow(clippy::unused_unit)]
            fn rotate_right(self) -> Self::Output {
                let ($($v,)*) = self;
                ($($rv,)*)
            }
        }
    )*};
}

impl_rotate_right! {
    0: () => ();

    0: (A a) => (A a);
    1: (A a) => (A a);

    0: (A a, B b) => (A a, B b);
    1: (A a, B b) => (B b, A a);
    2: (A a, B b) => (A a, B b);

    0: (A a, B b, C c) => (A a, B b, C c);
    1: (A a, B b, C c) => (C c, A a, B b);
    2: (A a, B b, C c) => (B b, C c, A a);

    0: (A a, B b, C c, D d) => (A a, B b, C c, D d);
    1: (A a, B b, C c, D d) => (D d, A a, B b, C c);
    2: (A a, B b, C c, D d) => (C c, D d, A a, B b);
    3: (A a, B b, C c, D d) => (B b, C c, D d, A a);

    0: (A a, B b, C c, D d, E e) => (A a, B b, C c, D d, E e);
    1: (A a, B b, C c, D d, E e) => (E e, A a, B b, C c, D d);
    2: (A a, B b, C c, D d, E e) => (D d, E e, A a, B b, C c);
    3: (A a, B b, C c, D d, E e) => (C c, D d, E e, A a, B b);
    4: (A a, B b, C c, D d, E e) => (B b, C c, D d, E e, A a);

    0: (A a, B b, C c, D d, E e, F f) => (A a, B b, C c, D d, E e, F f);
    1: (A a, B b, C c, D d, E e, F f) => (F f, A a, B b, C c, D d, E e);
    2: (A a, B b, C c, D d, E e, F f) => (E e, F f, A a, B b, C c, D d);
    3: (A a, B b, C c, D d, E e, F f) => (D d, E e, F f, A a, B b, C c);
    4: (A a, B b, C c, D d, E e, F f) => (C c, D d, E e, F f, A a, B b);
    5: (A a, B b, C c, D d, E e, F f) => (B b, C c, D d, E e, F f, A a);
}

impl<T, const N: usize, const OFFSET: usize> RotateRight<OFFSET> for [T; N] {
    type Output = [T; N];

    #[inline]
    fn rotate_right(mut self) -> [T; N] {
        if N != 0 {
            self.as_mut_slice().rotate_right(OFFSET % N);
        }
        self
    }
}
