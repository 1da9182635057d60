use serde::Serialize;

/// One page of an ordered result set plus the metadata templates need.
#[derive(Serialize, Debug, Clone)]
pub struct Page<T> {
    pub object_list: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<usize>,
    pub previous_page_number: Option<usize>,
}

impl<T> Page<T> {
    pub fn map<U, F>(self, f: F) -> anyhow::Result<Page<U>>
    where
        F: FnMut(T) -> anyhow::Result<U>,
    {
        let object_list = self
            .object_list
            .into_iter()
            .map(f)
            .collect::<anyhow::Result<Vec<U>>>()?;
        Ok(Page {
            object_list,
            number: self.number,
            num_pages: self.num_pages,
            count: self.count,
            has_next: self.has_next,
            has_previous: self.has_previous,
            next_page_number: self.next_page_number,
            previous_page_number: self.previous_page_number,
        })
    }

    pub fn len(&self) -> usize {
        self.object_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.object_list.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    per_page: usize,
}

impl Paginator {
    pub fn new(per_page: usize) -> Self {
        Self {
            per_page: per_page.max(1),
        }
    }

    /// An empty result still has one (empty) page.
    pub fn num_pages(&self, count: usize) -> usize {
        if count == 0 {
            1
        } else {
            (count + self.per_page - 1) / self.per_page
        }
    }

    /// Missing or malformed numbers select the first page; out-of-range
    /// numbers clamp to the nearest valid page.
    pub fn page_number(&self, raw: Option<&str>, count: usize) -> usize {
        let last = self.num_pages(count);
        match raw.and_then(|s| s.trim().parse::<i64>().ok()) {
            Some(n) if n < 1 => 1,
            Some(n) if n as u64 > last as u64 => last,
            Some(n) => n as usize,
            None => 1,
        }
    }

    pub fn get_page<T>(&self, items: Vec<T>, raw: Option<&str>) -> Page<T> {
        let count = items.len();
        let num_pages = self.num_pages(count);
        let number = self.page_number(raw, count);
        let start = (number - 1) * self.per_page;

        let object_list: Vec<T> = items.into_iter().skip(start).take(self.per_page).collect();

        Page {
            object_list,
            number,
            num_pages,
            count,
            has_next: number < num_pages,
            has_previous: number > 1,
            next_page_number: (number < num_pages).then(|| number + 1),
            previous_page_number: (number > 1).then(|| number - 1),
        }
    }
}
