use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Reusable read buffers for WHOIS socket I/O.
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    buffer_size: usize,
    max_pooled: usize,
}

impl BufferPool {
    pub fn new(buffer_size: usize, max_pooled: usize) -> Arc<Self> {
        Arc::new(Self {
            buffers: Mutex::new(Vec::with_capacity(max_pooled)),
            buffer_size,
            max_pooled,
        })
    }

    /// Take a zeroed buffer; it goes back to the pool when dropped.
    pub fn checkout(self: &Arc<Self>) -> PooledBuffer {
        // Never wait on the lock; a fresh allocation is cheaper than contention
        let recycled = self.buffers.try_lock().ok().and_then(|mut pool| pool.pop());

        let buffer = match recycled {
            Some(mut buf) => {
                buf.clear();
                buf.resize(self.buffer_size, 0);
                buf
            }
            None => {
                debug!("Buffer pool empty or busy, allocating {} bytes", self.buffer_size);
                vec![0; self.buffer_size]
            }
        };

        PooledBuffer {
            buffer,
            pool: Arc::clone(self),
        }
    }

    pub async fn pooled(&self) -> usize {
        self.buffers.lock().await.len()
    }
}

pub struct PooledBuffer {
    buffer: Vec<u8>,
    pool: Arc<BufferPool>,
}

impl PooledBuffer {
    pub fn as_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Ok(mut pool) = self.pool.buffers.try_lock() {
            if pool.len() < self.pool.max_pooled {
                pool.push(std::mem::take(&mut self.buffer));
            }
        }
    }
}
