mod diff_bitmaps_test;
